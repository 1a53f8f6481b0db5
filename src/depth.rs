//! Dense depth maps written by COLMAP's patch match stereo.
//!
//! A depth map file starts with the ASCII header `width&height&channels&` followed by
//! `width * height * channels` little endian `f32` values, x varying fastest.
extern crate byteorder;
extern crate ndarray;
extern crate nom;

use byteorder::{ByteOrder, LittleEndian};
use nom::character::complete::{char, digit1};
use nom::combinator::map_res;
use nom::sequence::{terminated, tuple};
use nom::IResult;
use tracing::debug;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::model::Error;

/// Single channel depth image, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

fn header(input: &[u8]) -> IResult<&[u8], (usize, usize, usize)> {
    fn dim(input: &[u8]) -> IResult<&[u8], usize> {
        map_res(
            map_res(terminated(digit1, char('&')), std::str::from_utf8),
            usize::from_str,
        )(input)
    }
    tuple((dim, dim, dim))(input)
}

impl DepthMap {
    /// Decode a depth map from the raw file contents.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (payload, (width, height, channels)) = header(bytes)
            .map_err(|_| Error::ParseError("invalid depth map header".to_string()))?;
        if channels != 1 {
            return Err(Error::ParseError(format!(
                "expected a single channel depth map, got {} channels",
                channels
            )));
        }
        if width > u32::MAX as usize || height > u32::MAX as usize {
            return Err(Error::ParseError(format!(
                "depth map dimensions {}x{} are too large",
                width, height
            )));
        }
        let len = width.checked_mul(height).and_then(|len| {
            len.checked_mul(4)
                .filter(|bytes| *bytes == payload.len())
                .map(|_| len)
        });
        let len = match len {
            Some(len) => len,
            None => {
                return Err(Error::ParseError(format!(
                    "depth map header announces {}x{} values but the file holds {} bytes",
                    width,
                    height,
                    payload.len()
                )))
            }
        };
        let mut data = vec![0f32; len];
        LittleEndian::read_f32_into(payload, &mut data);
        for d in data.iter_mut() {
            if !d.is_finite() || *d <= 0.0 {
                *d = 0.0;
            }
        }
        Ok(DepthMap {
            width: width as u32,
            height: height as u32,
            data,
        })
    }

    /// Depth at pixel `(x, y)`.
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Nearest neighbour resampling to `width` x `height`.
    pub fn resized(&self, width: u32, height: u32) -> DepthMap {
        if (width, height) == (self.width, self.height) {
            return self.clone();
        }
        if self.width == 0 || self.height == 0 {
            return DepthMap {
                width,
                height,
                data: vec![0.0; width as usize * height as usize],
            };
        }
        // source pixel whose footprint contains the center of the target pixel
        let nearest = |dst: u32, dst_len: u32, src_len: u32| -> u32 {
            let src = (2 * dst as u64 + 1) * src_len as u64 / (2 * dst_len as u64);
            src.min(src_len as u64 - 1) as u32
        };
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            let sy = nearest(y, height, self.height);
            for x in 0..width {
                data.push(self.get(nearest(x, width, self.width), sy));
            }
        }
        DepthMap {
            width,
            height,
            data,
        }
    }

    /// View as a `height x width` array.
    pub fn to_array(&self) -> ndarray::Array2<f32> {
        ndarray::Array2::from_shape_fn((self.height as usize, self.width as usize), |(y, x)| {
            self.get(x as u32, y as u32)
        })
    }
}

pub fn read_depth_map(path: &Path) -> Result<DepthMap, Error> {
    debug!("reading depth map {}", path.display());
    DepthMap::from_bytes(&std::fs::read(path)?)
}

/// Depth map for the image named `image_name`. Geometric depth maps are preferred over photometric
/// ones.
pub fn depth_map_path(depths_root: &Path, image_name: &str) -> Option<PathBuf> {
    ["geometric", "photometric"]
        .iter()
        .map(|kind| depths_root.join(format!("{}.{}.bin", image_name, kind)))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(width: usize, height: usize, values: &[f32]) -> Vec<u8> {
        let mut bytes = format!("{}&{}&1&", width, height).into_bytes();
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn decode_depth_map() {
        let bytes = encode(3, 2, &[1.0, 2.0, 3.0, 4.0, -1.0, f32::NAN]);
        let depth = DepthMap::from_bytes(&bytes).unwrap();
        assert_eq!((depth.width, depth.height), (3, 2));
        assert_eq!(depth.get(2, 0), 3.0);
        assert_eq!(depth.get(0, 1), 4.0);
        // invalid depths are zeroed
        assert_eq!(depth.get(1, 1), 0.0);
        assert_eq!(depth.get(2, 1), 0.0);
        let array = depth.to_array();
        assert_eq!(array.dim(), (2, 3));
        assert_eq!(array[[1, 0]], 4.0);
    }

    #[test]
    fn reject_size_mismatch() {
        let bytes = encode(3, 3, &[1.0; 4]);
        assert!(matches!(
            DepthMap::from_bytes(&bytes),
            Err(Error::ParseError(_))
        ));
        assert!(DepthMap::from_bytes(b"3&x&1&").is_err());
    }

    #[test]
    fn reject_huge_header() {
        assert!(matches!(
            DepthMap::from_bytes(b"99999999999&99999999999&1&"),
            Err(Error::ParseError(_))
        ));
        assert!(matches!(
            DepthMap::from_bytes(b"18446744073709551615&2&1&"),
            Err(Error::ParseError(_))
        ));
        assert!(matches!(
            DepthMap::from_bytes(b"4294967296&0&1&"),
            Err(Error::ParseError(_))
        ));
    }

    #[test]
    fn reject_multi_channel() {
        let mut bytes = b"1&1&3&".to_vec();
        bytes.extend_from_slice(&[0u8; 12]);
        assert!(DepthMap::from_bytes(&bytes).is_err());
    }

    #[test]
    fn resize_nearest() {
        let depth = DepthMap {
            width: 2,
            height: 1,
            data: vec![1.0, 2.0],
        };
        let resized = depth.resized(4, 2);
        assert_eq!((resized.width, resized.height), (4, 2));
        assert_eq!(resized.get(0, 0), 1.0);
        assert_eq!(resized.get(3, 1), 2.0);
    }

    #[test]
    fn resize_keeps_metric_depths() {
        let depth = DepthMap {
            width: 4,
            height: 4,
            data: (1..=16).map(|v| v as f32).collect(),
        };
        let down = depth.resized(2, 2);
        assert_eq!(down.data, vec![6.0, 8.0, 14.0, 16.0]);

        let far = DepthMap {
            width: 2,
            height: 2,
            data: vec![12.5, 40.0, 3.25, 100.0],
        };
        let up = far.resized(4, 4);
        assert_eq!(up.get(0, 0), 12.5);
        assert_eq!(up.get(3, 0), 40.0);
        assert_eq!(up.get(1, 3), 3.25);
        assert_eq!(up.get(2, 2), 100.0);
        assert_eq!(up.to_array()[[3, 3]], 100.0);
    }

    #[test]
    fn prefer_geometric() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(depth_map_path(dir.path(), "a.jpg"), None);
        let photometric = dir.path().join("a.jpg.photometric.bin");
        std::fs::write(&photometric, b"").unwrap();
        assert_eq!(depth_map_path(dir.path(), "a.jpg"), Some(photometric));
        let geometric = dir.path().join("a.jpg.geometric.bin");
        std::fs::write(&geometric, b"").unwrap();
        assert_eq!(depth_map_path(dir.path(), "a.jpg"), Some(geometric));
    }
}
