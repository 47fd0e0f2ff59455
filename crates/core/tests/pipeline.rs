//! End-to-end pipeline tests: full generation runs over synthetic rasters,
//! textures and footprints, checked through the exported OBJ.

use geomesh_core::{
    generate, BoundingBox, BuildingFootprint, CancelToken, ElevationGrid, GenerationConfig,
    GenerationInput, GeoCoord, PolygonShape, RowOrientation, TextureImage,
};

const NORTH: f64 = 47.02;
const SOUTH: f64 = 47.0;
const EAST: f64 = 8.03;
const WEST: f64 = 8.0;

fn bbox() -> BoundingBox {
    BoundingBox::new(NORTH, SOUTH, EAST, WEST).unwrap()
}

fn png_texture() -> TextureImage {
    let mut bytes = Vec::new();
    let img = image::RgbImage::from_fn(4, 4, |x, y| image::Rgb([60 + 10 * x as u8, 100, 60 + 10 * y as u8]));
    image::DynamicImage::ImageRgb8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
    TextureImage {
        bytes,
        bbox: BoundingBox::new(NORTH + 0.005, SOUTH - 0.005, EAST + 0.005, WEST - 0.005).unwrap(),
    }
}

/// Square footprint around (lat, lon), roughly `side_m` on a side.
fn square_at(lat: f64, lon: f64, side_m: f64) -> BuildingFootprint {
    let dlat = side_m / 2.0 / 111_320.0;
    let dlon = dlat / lat.to_radians().cos();
    BuildingFootprint {
        shapes: vec![PolygonShape {
            outer: vec![
                GeoCoord { lat: lat - dlat, lon: lon - dlon },
                GeoCoord { lat: lat - dlat, lon: lon + dlon },
                GeoCoord { lat: lat + dlat, lon: lon + dlon },
                GeoCoord { lat: lat + dlat, lon: lon - dlon },
                GeoCoord { lat: lat - dlat, lon: lon - dlon },
            ],
            holes: vec![],
        }],
        ..Default::default()
    }
}

fn job(grid: ElevationGrid, footprints: Vec<BuildingFootprint>) -> GenerationInput {
    GenerationInput {
        bbox: bbox(),
        grid,
        footprints,
        texture: png_texture(),
        stem: "scene".to_string(),
    }
}

/// Smoothing disabled so elevation assertions stay exact.
fn config() -> GenerationConfig {
    let mut config = GenerationConfig::default();
    config.terrain.smoothing_sigma = 0.0;
    config
}

/// Minimal OBJ reader for assertions: statement counts and position bounds.
struct ParsedObj {
    v: usize,
    vt: usize,
    vn: usize,
    f: usize,
    min: [f64; 3],
    max: [f64; 3],
}

fn parse_obj(obj: &str) -> ParsedObj {
    let mut parsed = ParsedObj {
        v: 0,
        vt: 0,
        vn: 0,
        f: 0,
        min: [f64::MAX; 3],
        max: [f64::MIN; 3],
    };
    for line in obj.lines() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => {
                parsed.v += 1;
                for axis in 0..3 {
                    let value: f64 = parts.next().unwrap().parse().unwrap();
                    parsed.min[axis] = parsed.min[axis].min(value);
                    parsed.max[axis] = parsed.max[axis].max(value);
                }
            }
            Some("vt") => parsed.vt += 1,
            Some("vn") => parsed.vn += 1,
            Some("f") => parsed.f += 1,
            _ => {}
        }
    }
    parsed
}

#[test]
fn generation_is_deterministic() {
    let make = || {
        let grid = ElevationGrid::new(
            8,
            8,
            (0..64).map(|i| (i % 7) as f32 * 4.0).collect(),
            RowOrientation::NorthUp,
        )
        .unwrap();
        job(
            grid,
            vec![square_at(47.01, 8.012, 18.0), square_at(47.012, 8.02, 25.0)],
        )
    };
    let first = generate(make(), &config(), &CancelToken::new()).unwrap();
    let second = generate(make(), &config(), &CancelToken::new()).unwrap();
    assert_eq!(first.export.obj, second.export.obj, "OBJ must be byte-identical");
    assert_eq!(first.export.mtl, second.export.mtl);
}

#[test]
fn exported_obj_matches_report_and_metric_extent() {
    let grid = ElevationGrid::new(6, 6, vec![100.0; 36], RowOrientation::NorthUp).unwrap();
    let output = generate(
        job(grid, vec![square_at(47.01, 8.015, 20.0)]),
        &config(),
        &CancelToken::new(),
    )
    .unwrap();

    let parsed = parse_obj(&output.export.obj);
    assert_eq!(parsed.v, output.report.scene_vertices);
    assert_eq!(parsed.vt, output.report.scene_vertices);
    assert_eq!(parsed.vn, output.report.scene_vertices);
    assert_eq!(parsed.f, output.report.scene_triangles);

    // The terrain dominates the scene bounds; its extent must match the
    // bbox's metric size within serialization precision (sub-millimeter).
    let bbox = bbox();
    let width = parsed.max[0] - parsed.min[0];
    let depth = parsed.max[2] - parsed.min[2];
    assert!(
        (width - bbox.width_m()).abs() < 1e-3,
        "x extent {width} vs bbox width {}",
        bbox.width_m()
    );
    assert!(
        (depth - bbox.height_m()).abs() < 1e-3,
        "z extent {depth} vs bbox height {}",
        bbox.height_m()
    );

    // Centered horizontally, elevation untouched
    assert!((parsed.min[0] + parsed.max[0]).abs() < 1e-2);
    assert!(parsed.min[1] >= 100.0 - 1e-3);
}

#[test]
fn small_grid_example_counts() {
    let mut values = vec![0.0f32; 9];
    values[4] = 10.0;
    let grid = ElevationGrid::new(3, 3, values, RowOrientation::NorthUp).unwrap();
    let output = generate(job(grid, vec![]), &config(), &CancelToken::new()).unwrap();

    assert_eq!(output.report.scene_vertices, 9);
    assert_eq!(output.report.scene_triangles, 8);
    // The raised sample sits at the grid center regardless of orientation
    let terrain = &output.scene.terrain;
    assert_eq!(terrain.grid.elevation(1, 1), 10.0);
    assert_eq!(terrain.mesh.positions[4].y, 10.0);
}

#[test]
fn building_base_follows_terrain_elevation() {
    // Elevation grows northward: 0 m at the southern edge, 40 m at the
    // northern edge (5 rows, north-up input). A building at the bbox center
    // must sit at the middle row's elevation. This pins the whole axis
    // chain: raster orientation, projection sign, sampler lookup.
    let mut rows = Vec::new();
    for r in 0..5 {
        rows.push(vec![(4 - r) as f32 * 10.0; 5]);
    }
    let grid = ElevationGrid::from_rows(rows, RowOrientation::NorthUp).unwrap();

    let center_lat = (NORTH + SOUTH) / 2.0;
    let center_lon = (EAST + WEST) / 2.0;
    let mut footprint = square_at(center_lat, center_lon, 20.0);
    footprint.height_m = Some(8.0);

    let output = generate(job(grid, vec![footprint]), &config(), &CancelToken::new()).unwrap();
    let building = output.scene.buildings[0].as_ref().unwrap();
    let (min, max) = building.mesh.bounds().unwrap();
    assert!(
        (min.y - 20.0).abs() < 0.01,
        "building base {} should match the center-row elevation 20",
        min.y
    );
    assert!(((max.y - min.y) as f64 - 8.0).abs() < 0.01);
}

#[test]
fn failed_footprints_stay_index_aligned() {
    let grid = ElevationGrid::new(5, 5, vec![0.0; 25], RowOrientation::NorthUp).unwrap();
    let footprints = vec![
        square_at(47.005, 8.01, 15.0),
        BuildingFootprint::default(),
        square_at(47.015, 8.02, 15.0),
        // Far outside the grid
        square_at(47.3, 8.01, 15.0),
    ];
    let output = generate(job(grid, footprints), &config(), &CancelToken::new()).unwrap();

    assert_eq!(output.scene.buildings.len(), 4);
    let presence: Vec<bool> = output.scene.buildings.iter().map(Option::is_some).collect();
    assert_eq!(presence, vec![true, false, true, false]);
    for (i, building) in output.scene.buildings.iter().enumerate() {
        if let Some(b) = building {
            assert_eq!(b.footprint_index, i);
        }
    }
    assert_eq!(output.report.buildings_generated, 2);
    assert_eq!(output.report.failure_reasons["empty_footprint"], 1);
    assert_eq!(output.report.failure_reasons["out_of_bounds"], 1);
}

#[test]
fn crossed_footprint_outline_is_recorded_as_failure() {
    let grid = ElevationGrid::new(5, 5, vec![0.0; 25], RowOrientation::NorthUp).unwrap();

    // Asymmetric crossed quad around the bbox center: encloses net area, so
    // only the crossing-edge check can catch it.
    let lat0 = (NORTH + SOUTH) / 2.0;
    let lon0 = (EAST + WEST) / 2.0;
    let m_lat = 1.0 / 111_320.0;
    let m_lon = m_lat / lat0.to_radians().cos();
    let at = |east: f64, north: f64| GeoCoord {
        lat: lat0 + north * m_lat,
        lon: lon0 + east * m_lon,
    };
    let crossed = BuildingFootprint {
        shapes: vec![PolygonShape {
            outer: vec![at(0.0, 0.0), at(30.0, 0.0), at(0.0, 20.0), at(20.0, 30.0)],
            holes: vec![],
        }],
        height_m: Some(10.0),
        ..Default::default()
    };

    let output = generate(
        job(grid, vec![crossed, square_at(47.015, 8.02, 15.0)]),
        &config(),
        &CancelToken::new(),
    )
    .unwrap();

    assert!(output.scene.buildings[0].is_none(), "crossed outline must not extrude");
    assert!(output.scene.buildings[1].is_some());
    assert_eq!(output.report.buildings_failed, 1);
    assert_eq!(output.report.failure_reasons["self_intersecting"], 1);
}

#[test]
fn obj_groups_and_mtl_reference_each_other() {
    let grid = ElevationGrid::new(4, 4, vec![0.0; 16], RowOrientation::NorthUp).unwrap();
    let output = generate(
        job(grid, vec![square_at(47.01, 8.015, 20.0)]),
        &config(),
        &CancelToken::new(),
    )
    .unwrap();

    let obj = &output.export.obj;
    assert!(obj.starts_with("mtllib scene.mtl\n"));
    assert!(obj.contains("usemtl terrain"));
    assert!(obj.contains("usemtl buildings"));
    assert!(output.export.mtl.contains("newmtl terrain"));
    assert!(output.export.mtl.contains("newmtl buildings"));
    assert!(output.export.mtl.contains(&format!("map_Kd {}", output.export.texture_name)));
    // Texture bytes pass through unmodified
    assert_eq!(output.export.texture, png_texture().bytes);
}
