//! Template descriptors and in-session placement calibration

use crate::{
    error::{PhotoBoothError, Result},
    services::RasterSource,
    types::PlacementRect,
};
use serde::{Deserialize, Serialize};

/// Smallest photo slot the calibration controls allow, per axis
pub const MIN_CALIBRATED_EXTENT: u32 = 100;

/// Photo slot of the standard template
pub const STANDARD_PLACEMENT: PlacementRect = PlacementRect::new(85, 390, 720, 880);

/// A frame image with the rectangle the captured photo is drawn into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: u32,
    pub name: String,
    /// Asset path or URL of the frame image
    pub source: String,
    pub placement: PlacementRect,
}

impl Template {
    /// Source to hand to the raster loader
    #[must_use]
    pub fn raster_source(&self) -> RasterSource {
        RasterSource::parse(&self.source)
    }
}

/// Read-only set of templates
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
}

impl TemplateCatalog {
    #[must_use]
    pub fn new(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    /// Templates shipped with the booth
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(vec![Template {
            id: 1,
            name: "Standard Template".to_string(),
            source: "/HUL PNG.png".to_string(),
            placement: STANDARD_PLACEMENT,
        }])
    }

    #[must_use]
    pub fn get(&self, id: u32) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Look up a template or fail with a configuration error
    ///
    /// # Errors
    /// - No template with this id
    pub fn require(&self, id: u32) -> Result<&Template> {
        self.get(id).ok_or_else(|| {
            PhotoBoothError::invalid_config(format!("Unknown template id {}", id))
        })
    }

    #[must_use]
    pub fn list(&self) -> &[Template] {
        &self.templates
    }
}

/// Placement override adjusted against a loaded template.
///
/// Each setter clamps to the calibration bounds: the origin stays within the
/// template and each extent is between [`MIN_CALIBRATED_EXTENT`] and the template
/// size (or the template size alone when it is smaller than that).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    placement: PlacementRect,
    template_width: u32,
    template_height: u32,
}

impl Calibration {
    #[must_use]
    pub fn new(initial: PlacementRect, template_width: u32, template_height: u32) -> Self {
        let mut calibration = Self {
            placement: initial,
            template_width,
            template_height,
        };
        calibration.set_x(initial.x);
        calibration.set_y(initial.y);
        calibration.set_width(initial.width);
        calibration.set_height(initial.height);
        calibration
    }

    pub fn set_x(&mut self, x: i64) {
        self.placement.x = x.clamp(0, i64::from(self.template_width));
    }

    pub fn set_y(&mut self, y: i64) {
        self.placement.y = y.clamp(0, i64::from(self.template_height));
    }

    pub fn set_width(&mut self, width: u32) {
        self.placement.width = clamp_extent(width, self.template_width);
    }

    pub fn set_height(&mut self, height: u32) {
        self.placement.height = clamp_extent(height, self.template_height);
    }

    #[must_use]
    pub fn placement(&self) -> PlacementRect {
        self.placement
    }

    /// Placement as a JSON block for pasting into a template definition
    #[must_use]
    pub fn snippet(&self) -> String {
        format!(
            "{{\n    \"x\": {},\n    \"y\": {},\n    \"width\": {},\n    \"height\": {}\n}}",
            self.placement.x, self.placement.y, self.placement.width, self.placement.height
        )
    }
}

fn clamp_extent(value: u32, limit: u32) -> u32 {
    let min = MIN_CALIBRATED_EXTENT.min(limit).max(1);
    value.clamp(min, limit.max(min))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let catalog = TemplateCatalog::builtin();
        assert_eq!(catalog.list().len(), 1);
        let standard = catalog.get(1).unwrap();
        assert_eq!(standard.name, "Standard Template");
        assert_eq!(standard.placement, PlacementRect::new(85, 390, 720, 880));
        assert!(matches!(standard.raster_source(), RasterSource::Path(_)));
        assert!(catalog.require(2).is_err());
    }

    #[test]
    fn test_calibration_clamps() {
        let mut calibration = Calibration::new(STANDARD_PLACEMENT, 1000, 1200);
        assert_eq!(calibration.placement(), STANDARD_PLACEMENT);

        calibration.set_x(-20);
        calibration.set_y(5000);
        calibration.set_width(10);
        calibration.set_height(4000);
        assert_eq!(calibration.placement(), PlacementRect::new(0, 1200, 100, 1200));
    }

    #[test]
    fn test_calibration_small_template() {
        let calibration = Calibration::new(STANDARD_PLACEMENT, 60, 40);
        let placement = calibration.placement();
        assert_eq!((placement.width, placement.height), (60, 40));
        assert_eq!((placement.x, placement.y), (60, 40));
    }

    #[test]
    fn test_snippet_is_json() {
        let calibration = Calibration::new(STANDARD_PLACEMENT, 1000, 1200);
        let parsed: PlacementRect = serde_json::from_str(&calibration.snippet()).unwrap();
        assert_eq!(parsed, STANDARD_PLACEMENT);
    }
}
