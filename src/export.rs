//! Export of sparse models for other point cloud tools.
extern crate ply_rs;

use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Ply, Property, PropertyDef, PropertyType, ScalarType,
};
use ply_rs::writer::Writer;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::model::SparseModel;

const CAMERA_COLOR: [u8; 3] = [255, 0, 0];

fn vertex(xyz: [f64; 3], rgb: [u8; 3]) -> DefaultElement {
    let mut v = DefaultElement::new();
    v.insert("x".to_string(), Property::Float(xyz[0] as f32));
    v.insert("y".to_string(), Property::Float(xyz[1] as f32));
    v.insert("z".to_string(), Property::Float(xyz[2] as f32));
    v.insert("red".to_string(), Property::UChar(rgb[0]));
    v.insert("green".to_string(), Property::UChar(rgb[1]));
    v.insert("blue".to_string(), Property::UChar(rgb[2]));
    v
}

/// Build the PLY representation of `model`: camera centers (red) followed by the 3D points in
/// their own color, plus one edge per observation from the camera vertex to the point vertex.
pub fn to_ply(model: &SparseModel) -> Ply<DefaultElement> {
    let mut ply = Ply::<DefaultElement>::new();
    let mut point_element = ElementDef::new("vertex".to_string());
    for name in ["x", "y", "z"].iter() {
        point_element.properties.add(PropertyDef::new(
            name.to_string(),
            PropertyType::Scalar(ScalarType::Float),
        ));
    }
    for name in ["red", "green", "blue"].iter() {
        point_element.properties.add(PropertyDef::new(
            name.to_string(),
            PropertyType::Scalar(ScalarType::UChar),
        ));
    }
    ply.header.elements.add(point_element);
    let mut edge_element = ElementDef::new("edge".to_string());
    edge_element.properties.add(PropertyDef::new(
        "vertex1".to_string(),
        PropertyType::Scalar(ScalarType::Int),
    ));
    edge_element.properties.add(PropertyDef::new(
        "vertex2".to_string(),
        PropertyType::Scalar(ScalarType::Int),
    ));
    ply.header.elements.add(edge_element);

    let num_images = model.num_images();
    let image_index = model
        .images
        .keys()
        .enumerate()
        .map(|(i, id)| (*id, i))
        .collect::<HashMap<_, _>>();

    let mut vertices = model
        .images
        .values()
        .map(|image| {
            let c = image.center();
            vertex([c.x, c.y, c.z], CAMERA_COLOR)
        })
        .collect::<Vec<_>>();
    vertices.extend(model.points3d.values().map(|p| vertex(p.xyz, p.rgb)));
    ply.payload.insert("vertex".to_string(), vertices);

    // observations of images that were dropped from the model have no camera vertex
    let edges = model
        .points3d
        .values()
        .enumerate()
        .flat_map(|(pi, point)| {
            let image_index = &image_index;
            point.track.iter().filter_map(move |t| {
                image_index.get(&t.image_id).map(|ci| {
                    let mut e = DefaultElement::new();
                    e.insert("vertex1".to_string(), Property::Int(*ci as i32));
                    e.insert(
                        "vertex2".to_string(),
                        Property::Int((pi + num_images) as i32),
                    );
                    e
                })
            })
        })
        .collect();
    ply.payload.insert("edge".to_string(), edges);

    ply
}

/// Write `model` as an ASCII PLY file, see [to_ply].
pub fn write_ply(model: &SparseModel, path: &Path) -> Result<(), std::io::Error> {
    let mut ply = to_ply(model);
    let mut file = BufWriter::new(File::create(path)?);
    let writer = Writer::new();
    writer.write_ply(&mut file, &mut ply)?;
    file.flush()
}
