use syncoreg::core::CoordinateMapBuilder;
use syncoreg::io::{ElementType, MemoryArrayFile, MemoryCalibrationStore, MemoryVariable};
use syncoreg::types::{BandIdentity, CoordinateMap, GridCoordinate, View};
use syncoreg::CoregistrationConfig;

const LINES: usize = 25_000;
const DETECTORS: usize = 2;
const SOURCE_DIMS: (usize, usize) = (200, 300);

const S5_OBLIQUE: BandIdentity = BandIdentity::Slstr {
    channel: 5,
    view: View::Oblique,
};

/// Deterministic row/col per (line, detector), with collisions and invalid entries
fn raw_entry(line: usize, detector: usize) -> (f64, f64) {
    if line % 97 == 0 {
        return (-1.0, 3.0);
    }
    if line % 89 == 0 {
        return (5.0, 200.0);
    }
    let row = ((line * 7 + detector) % 310) as f64;
    let col = ((line * 3 + detector * 11) % 200) as f64;
    (row, col)
}

fn store() -> MemoryCalibrationStore {
    let mut rows = Vec::with_capacity(LINES * DETECTORS);
    let mut cols = Vec::with_capacity(LINES * DETECTORS);
    for line in 0..LINES {
        for detector in 0..DETECTORS {
            let (row, col) = raw_entry(line, detector);
            rows.push(row);
            cols.push(col);
        }
    }
    let dims = [("N_CAM", 1), ("N_LINE_OLC", LINES), ("N_DET_CAM", DETECTORS)];
    let file = MemoryArrayFile::new("MISR_S5_o.nc")
        .with_variable("delta_row_05_o", MemoryVariable::new(ElementType::I32, &dims, rows).unwrap())
        .with_variable("delta_col_05_o", MemoryVariable::new(ElementType::I32, &dims, cols).unwrap());
    MemoryCalibrationStore::new().with_file(file)
}

/// The map a single read over the whole grid produces
fn whole_array_map() -> CoordinateMap {
    let (width, height) = SOURCE_DIMS;
    let mut map = CoordinateMap::new();
    for line in 0..LINES {
        for detector in 0..DETECTORS {
            let (row, col) = raw_entry(line, detector);
            if row >= 0.0 && col >= 0.0 && (col as usize) < width && (row as usize) < height {
                map.insert_min(
                    GridCoordinate::image(col as u32, row as u32),
                    GridCoordinate::instrument(0, line as u32, detector as u32),
                );
            }
        }
    }
    map
}

fn chunked_map(store: &MemoryCalibrationStore, chunk_lines: usize) -> CoordinateMap {
    let config = CoregistrationConfig {
        chunk_lines,
        ..CoregistrationConfig::default()
    };
    CoordinateMapBuilder::new(store, &config)
        .build_source_map(S5_OBLIQUE, SOURCE_DIMS)
        .expect("stage A builds")
}

#[test]
fn test_chunked_read_equals_whole_read() {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = store();
    let expected = whole_array_map();

    let chunked = chunked_map(&store, 10_000);
    assert_eq!(chunked.len(), expected.len());
    assert_eq!(chunked.sorted_entries(), expected.sorted_entries());

    let uneven = chunked_map(&store, 3_333);
    assert_eq!(uneven, expected);
}

#[test]
fn test_chunked_map_respects_bounds() {
    let store = store();
    let map = chunked_map(&store, 10_000);
    let (width, height) = SOURCE_DIMS;

    assert!(!map.is_empty());
    for (key, value) in map.iter() {
        let (col, row) = key.as_image().expect("image key");
        assert!(col < width && row < height);
        assert_eq!(value.arity(), 3);
    }
}
