//! Expands the device matrix and demo set into ordered build steps.

use crate::domain::{BuildStep, DemoEntry, DeviceMatrix, MatrixCell, Phase, SkipNotice};

/// Produces the ordered cells for each matrix-driven phase
#[derive(Debug, Clone, Copy)]
pub struct MatrixIterator<'a> {
    devices: &'a DeviceMatrix,
    restricted_prefix: &'a str,
}

impl<'a> MatrixIterator<'a> {
    pub fn new(devices: &'a DeviceMatrix, restricted_prefix: &'a str) -> Self {
        Self {
            devices,
            restricted_prefix,
        }
    }

    /// One check step per device, in matrix order
    pub fn device_checks(&self) -> impl Iterator<Item = BuildStep> + 'a {
        self.devices.devices().iter().map(BuildStep::device_check)
    }

    /// Build steps for one demo.
    ///
    /// Each device yields a default-features build followed by a
    /// no-default-features build. Restricted demos skip devices outside the
    /// restricted family, one notice per skipped device.
    pub fn demo_cells(&self, demo: &'a DemoEntry) -> impl Iterator<Item = MatrixCell> + 'a {
        let prefix = self.restricted_prefix;
        self.devices.devices().iter().flat_map(move |device| {
            if demo.is_restricted() && !device.in_family(prefix) {
                vec![MatrixCell::Skipped(SkipNotice {
                    demo: demo.name.clone(),
                    device: device.id.clone(),
                    prefix: prefix.to_string(),
                })]
            } else {
                vec![
                    MatrixCell::Step(BuildStep::demo_build(demo, device, true)),
                    MatrixCell::Step(BuildStep::demo_build(demo, device, false)),
                ]
            }
        })
    }

    /// All demo-build cells: unrestricted demos first, then restricted demos
    pub fn demo_builds(&self, demos: &'a [DemoEntry]) -> impl Iterator<Item = MatrixCell> + 'a {
        let this = *self;
        let unrestricted = demos.iter().filter(|d| !d.is_restricted());
        let restricted = demos.iter().filter(|d| d.is_restricted());
        unrestricted
            .chain(restricted)
            .flat_map(move |demo| this.demo_cells(demo))
    }

    /// Cells for `phase`, lazily generated
    pub fn cells(
        &self,
        phase: Phase,
        demos: &'a [DemoEntry],
    ) -> Box<dyn Iterator<Item = MatrixCell> + 'a> {
        match phase {
            Phase::DeviceCheck => Box::new(self.device_checks().map(MatrixCell::Step)),
            Phase::DemoBuild => Box::new(self.demo_builds(demos)),
            standalone => Box::new(std::iter::once(MatrixCell::Step(BuildStep::standalone(
                standalone,
            )))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DemoClass, DeviceEntry};
    use std::path::PathBuf;

    fn matrix() -> DeviceMatrix {
        DeviceMatrix::new(vec![
            DeviceEntry::new("51", "tA"),
            DeviceEntry::new("52840", "tB"),
        ])
        .unwrap()
    }

    fn demo(path: &str, class: DemoClass) -> DemoEntry {
        DemoEntry::new(PathBuf::from(path), class)
    }

    fn steps(cells: impl Iterator<Item = MatrixCell>) -> Vec<BuildStep> {
        cells.filter_map(|c| c.as_step().cloned()).collect()
    }

    #[test]
    fn test_device_checks_follow_matrix_order() {
        let devices = matrix();
        let iter = MatrixIterator::new(&devices, "52");

        let checks: Vec<_> = iter.device_checks().collect();
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].device.as_ref().unwrap().id, "51");
        assert_eq!(checks[0].features.to_arg(), "51");
        assert_eq!(checks[1].device.as_ref().unwrap().id, "52840");
        assert!(checks.iter().all(|s| s.demo.is_none()));
    }

    #[test]
    fn test_unrestricted_demo_yields_two_steps_per_device() {
        let devices = matrix();
        let iter = MatrixIterator::new(&devices, "52");
        let x = demo("demos/x", DemoClass::Unrestricted);

        let built = steps(iter.demo_cells(&x));
        assert_eq!(built.len(), 2 * devices.devices().len());

        let modes: Vec<_> = built
            .iter()
            .map(|s| (s.device.as_ref().unwrap().id.as_str(), s.default_features))
            .collect();
        assert_eq!(
            modes,
            vec![("51", true), ("51", false), ("52840", true), ("52840", false)]
        );
        assert!(built.iter().all(|s| s.phase == Phase::DemoBuild));
    }

    #[test]
    fn test_restricted_demo_skips_other_families() {
        let devices = matrix();
        let iter = MatrixIterator::new(&devices, "52");
        let y = demo("demos/52y", DemoClass::Restricted);

        let cells: Vec<_> = iter.demo_cells(&y).collect();
        assert_eq!(cells.len(), 3);
        assert_eq!(
            cells[0],
            MatrixCell::Skipped(SkipNotice {
                demo: "52y".to_string(),
                device: "51".to_string(),
                prefix: "52".to_string(),
            })
        );

        let built = steps(cells.into_iter());
        assert_eq!(built.len(), 2);
        assert!(built
            .iter()
            .all(|s| s.device.as_ref().unwrap().id == "52840"));
    }

    #[test]
    fn test_restricted_demo_with_no_family_devices() {
        let devices = DeviceMatrix::new(vec![DeviceEntry::new("51", "tA")]).unwrap();
        let iter = MatrixIterator::new(&devices, "52");
        let y = demo("demos/52y", DemoClass::Restricted);

        let cells: Vec<_> = iter.demo_cells(&y).collect();
        assert_eq!(cells.len(), 1);
        assert!(cells[0].as_step().is_none());
    }

    #[test]
    fn test_unrestricted_demos_run_before_restricted() {
        let devices = matrix();
        let iter = MatrixIterator::new(&devices, "52");
        let demos = vec![
            demo("demos/52a", DemoClass::Restricted),
            demo("demos/b", DemoClass::Unrestricted),
        ];

        let order: Vec<_> = steps(iter.demo_builds(&demos))
            .into_iter()
            .map(|s| s.demo.unwrap().name)
            .collect();
        assert_eq!(order, vec!["b", "b", "b", "b", "52a", "52a"]);
    }

    #[test]
    fn test_no_demos_produces_no_cells() {
        let devices = matrix();
        let iter = MatrixIterator::new(&devices, "52");
        assert_eq!(iter.cells(Phase::DemoBuild, &[]).count(), 0);
        assert_eq!(iter.cells(Phase::FormatCheck, &[]).count(), 1);
    }
}
