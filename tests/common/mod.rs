//! Shared fixtures: 3MF packages built in-test and fake CAD tools.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};

/// Triangles of a closed unit cube, zero-based, outward-facing.
pub const CUBE_TRIANGLES: [[u32; 3]; 12] = [
    [3, 2, 1],
    [1, 0, 3],
    [4, 5, 6],
    [6, 7, 4],
    [0, 1, 5],
    [5, 4, 0],
    [1, 2, 6],
    [6, 5, 1],
    [2, 3, 7],
    [7, 6, 2],
    [3, 0, 4],
    [4, 7, 3],
];

pub const CUBE_VERTICES: [[f32; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [10.0, 0.0, 0.0],
    [10.0, 10.0, 0.0],
    [0.0, 10.0, 0.0],
    [0.0, 0.0, 10.0],
    [10.0, 0.0, 10.0],
    [10.0, 10.0, 10.0],
    [0.0, 10.0, 10.0],
];

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml" />
  <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml" />
</Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Target="/3D/3dmodel.model" Id="rel0" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel" />
</Relationships>"#;

/// Model XML for a 10 mm cube whose single base material has `color`.
pub fn cube_model_xml(color: &str) -> String {
    let vertices: String = CUBE_VERTICES
        .iter()
        .map(|[x, y, z]| format!("          <vertex x=\"{x}\" y=\"{y}\" z=\"{z}\" />\n"))
        .collect();
    let triangles: String = CUBE_TRIANGLES
        .iter()
        .map(|[a, b, c]| format!("          <triangle v1=\"{a}\" v2=\"{b}\" v3=\"{c}\" />\n"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xml:lang="en-US" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
  <metadata name="Title">Coloured Cube</metadata>
  <metadata name="Designer">Fixture</metadata>
  <resources>
    <basematerials id="1">
      <base name="Cube Colour" displaycolor="{color}" />
    </basematerials>
    <object id="2" name="Cube" type="model" pid="1" pindex="0">
      <mesh>
        <vertices>
{vertices}        </vertices>
        <triangles>
{triangles}        </triangles>
      </mesh>
    </object>
  </resources>
  <build>
    <item objectid="2" />
  </build>
</model>
"#
    )
}

/// Write a complete 3MF package around `model_xml`.
pub fn write_3mf(path: &Path, model_xml: &str) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let opts = zip::write::SimpleFileOptions::default();
    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("3D/3dmodel.model", model_xml),
    ] {
        zip.start_file(name, opts).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// A red cube 3MF at `<dir>/cube.3mf`.
pub fn red_cube(dir: &Path) -> PathBuf {
    let path = dir.join("cube.3mf");
    write_3mf(&path, &cube_model_xml("#FF0000"));
    path
}

/// Route library logs through the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Parse a GLB file, panicking with context if it is not valid.
pub fn parse_glb(path: &Path) -> gltf::Gltf {
    let bytes = std::fs::read(path).unwrap();
    assert_eq!(&bytes[0..4], b"glTF", "missing GLB magic");
    assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 2);
    gltf::Gltf::from_slice(&bytes).expect("output should be a valid GLB")
}

/// Files named like the converter's intermediates anywhere in `dir`.
pub fn leftover_intermediates(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            let name = p.to_string_lossy();
            name.ends_with(".temp.obj") || name.ends_with(".temp.mtl")
        })
        .collect()
}

#[cfg(unix)]
pub mod tools {
    use super::{CUBE_TRIANGLES, CUBE_VERTICES};
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Write an executable `/bin/sh` script.
    pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// A tool that behaves like OpenSCAD: `-o <out.obj> <in.3mf>` writes a
    /// cube OBJ plus an MTL sidecar with the given `Kd`.
    pub fn cube_writer(dir: &Path, kd: &str) -> PathBuf {
        let mut obj = String::from("mtllib $(basename \"$mtl\")\no cube\n");
        for [x, y, z] in CUBE_VERTICES {
            obj.push_str(&format!("v {x} {y} {z}\n"));
        }
        obj.push_str("usemtl red\n");
        for [a, b, c] in CUBE_TRIANGLES {
            obj.push_str(&format!("f {} {} {}\n", a + 1, b + 1, c + 1));
        }
        let body = format!(
            "[ \"$1\" = \"-o\" ] || exit 64\n\
             [ -f \"$3\" ] || exit 65\n\
             mtl=\"${{2%.obj}}.mtl\"\n\
             printf 'newmtl red\\nKd {kd}\\n' > \"$mtl\"\n\
             cat > \"$2\" <<EOF\n{obj}EOF\n"
        );
        script(dir, "fake-openscad", &body)
    }

    /// A tool that writes partial intermediates, complains, and fails.
    pub fn crasher(dir: &Path) -> PathBuf {
        script(
            dir,
            "crashing-openscad",
            "echo 'v 0 0 0' > \"$2\"\n\
             echo 'x' > \"${2%.obj}.mtl\"\n\
             echo 'ERROR: CGAL error in CGAL_Nef_polyhedron3()' >&2\n\
             exit 1",
        )
    }

    /// A tool that never finishes on its own.
    pub fn sleeper(dir: &Path) -> PathBuf {
        script(dir, "sleepy-openscad", "exec sleep 30")
    }

    /// A tool that exits 0 after writing an OBJ with no faces.
    pub fn faceless(dir: &Path) -> PathBuf {
        script(dir, "faceless-openscad", "printf 'v 0 0 0\\nv 1 0 0\\n' > \"$2\"")
    }
}
