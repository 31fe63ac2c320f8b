use crate::types::{CoregError, CoregResult, GeoPos};
use ndarray::Array2;
use std::collections::HashMap;

/// Capability set the engine needs from a raster product
///
/// Implementations must be safe to read from several tile workers at once.
pub trait RasterProvider: Sync {
    /// (width, height) in pixels
    fn dimensions(&self) -> (usize, usize);

    fn has_band(&self, band: &str) -> bool;

    /// Geophysical sample, `None` for an unknown band or a pixel off the raster
    fn sample(&self, band: &str, x: usize, y: usize) -> Option<f64>;

    /// Product validity mask for `band` at (x, y)
    fn is_valid(&self, band: &str, x: usize, y: usize) -> bool;

    fn geo_position(&self, x: usize, y: usize) -> Option<GeoPos>;

    fn contains(&self, x: usize, y: usize) -> bool {
        let (width, height) = self.dimensions();
        x < width && y < height
    }
}

/// Raster held as ndarray planes indexed `[row, col]`
#[derive(Debug, Clone)]
pub struct ArrayRaster {
    width: usize,
    height: usize,
    bands: HashMap<String, Array2<f32>>,
    masks: HashMap<String, Array2<bool>>,
    lon: Option<Array2<f64>>,
    lat: Option<Array2<f64>>,
}

impl ArrayRaster {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bands: HashMap::new(),
            masks: HashMap::new(),
            lon: None,
            lat: None,
        }
    }

    fn check_shape<T>(&self, what: &str, plane: &Array2<T>) -> CoregResult<()> {
        if plane.dim() != (self.height, self.width) {
            return Err(CoregError::InvalidFormat(format!(
                "{} has shape {:?}, raster is {}x{}",
                what,
                plane.dim(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }

    pub fn add_band(&mut self, name: &str, data: Array2<f32>) -> CoregResult<()> {
        self.check_shape(name, &data)?;
        self.bands.insert(name.to_string(), data);
        Ok(())
    }

    pub fn with_band(mut self, name: &str, data: Array2<f32>) -> CoregResult<Self> {
        self.add_band(name, data)?;
        Ok(self)
    }

    /// Attach an explicit validity mask; bands without one are valid wherever finite
    pub fn add_mask(&mut self, name: &str, mask: Array2<bool>) -> CoregResult<()> {
        self.check_shape(name, &mask)?;
        self.masks.insert(name.to_string(), mask);
        Ok(())
    }

    pub fn set_geolocation(&mut self, lon: Array2<f64>, lat: Array2<f64>) -> CoregResult<()> {
        self.check_shape("longitude", &lon)?;
        self.check_shape("latitude", &lat)?;
        self.lon = Some(lon);
        self.lat = Some(lat);
        Ok(())
    }

    /// Regular lat/lon grid starting at (lon0, lat0) with the given pixel steps
    pub fn with_regular_geolocation(mut self, lon0: f64, lat0: f64, dlon: f64, dlat: f64) -> Self {
        let lon = Array2::from_shape_fn((self.height, self.width), |(_, x)| lon0 + x as f64 * dlon);
        let lat = Array2::from_shape_fn((self.height, self.width), |(y, _)| lat0 + y as f64 * dlat);
        self.lon = Some(lon);
        self.lat = Some(lat);
        self
    }

    pub fn band(&self, name: &str) -> Option<&Array2<f32>> {
        self.bands.get(name)
    }
}

impl RasterProvider for ArrayRaster {
    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn has_band(&self, band: &str) -> bool {
        self.bands.contains_key(band)
    }

    fn sample(&self, band: &str, x: usize, y: usize) -> Option<f64> {
        self.bands.get(band)?.get((y, x)).map(|&v| v as f64)
    }

    fn is_valid(&self, band: &str, x: usize, y: usize) -> bool {
        if let Some(mask) = self.masks.get(band) {
            return mask.get((y, x)).copied().unwrap_or(false);
        }
        self.sample(band, x, y).map_or(false, f64::is_finite)
    }

    fn geo_position(&self, x: usize, y: usize) -> Option<GeoPos> {
        let lon = *self.lon.as_ref()?.get((y, x))?;
        let lat = *self.lat.as_ref()?.get((y, x))?;
        Some(GeoPos::new(lon, lat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_are_row_major() {
        let data = Array2::from_shape_fn((3, 4), |(y, x)| (y * 10 + x) as f32);
        let raster = ArrayRaster::new(4, 3).with_band("S1_radiance_an", data).unwrap();
        assert_eq!(raster.sample("S1_radiance_an", 3, 2), Some(23.0));
        assert_eq!(raster.sample("S1_radiance_an", 4, 0), None);
        assert_eq!(raster.sample("S2_radiance_an", 0, 0), None);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let result = ArrayRaster::new(4, 3).with_band("b", Array2::zeros((4, 3)));
        assert!(matches!(result, Err(CoregError::InvalidFormat(_))));
    }

    #[test]
    fn test_validity_defaults_to_finite() {
        let mut data = Array2::from_elem((2, 2), 1.0f32);
        data[[1, 1]] = f32::NAN;
        let mut raster = ArrayRaster::new(2, 2).with_band("b", data).unwrap();
        assert!(raster.is_valid("b", 0, 0));
        assert!(!raster.is_valid("b", 1, 1));

        raster.add_mask("b", Array2::from_elem((2, 2), false)).unwrap();
        assert!(!raster.is_valid("b", 0, 0));
    }

    #[test]
    fn test_regular_geolocation() {
        let raster = ArrayRaster::new(5, 5).with_regular_geolocation(10.0, 50.0, 0.1, -0.1);
        let pos = raster.geo_position(2, 3).unwrap();
        approx::assert_abs_diff_eq!(pos.lon, 10.2, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(pos.lat, 49.7, epsilon = 1e-12);
        assert!(raster.geo_position(5, 0).is_none());
    }
}
