use fail::FailScenario;

/// Configures failpoints until dropped.
///
/// Every configured failpoint is turned off again on drop, so scenarios do not leak into other
/// tests of the same binary.
pub struct CustomFailScenario<'a> {
    _scenario: FailScenario<'a>,
    failpoints: Vec<String>,
}

impl<'a> CustomFailScenario<'a> {
    /// Configures each `(failpoint, action)` pair.
    ///
    /// Panics on an invalid action.
    pub fn setup(failpoints: &[(&str, &str)]) -> CustomFailScenario<'a> {
        let scenario = FailScenario::setup();

        for (failpoint, action) in failpoints {
            if let Err(err) = fail::cfg(*failpoint, action) {
                panic!("invalid action for failpoint {failpoint}: {err}");
            }
        }

        Self {
            _scenario: scenario,
            failpoints: failpoints
                .iter()
                .map(|(failpoint, _)| failpoint.to_string())
                .collect(),
        }
    }

    pub fn teardown(self) {
        drop(self);
    }
}

impl Drop for CustomFailScenario<'_> {
    fn drop(&mut self) {
        for failpoint in &self.failpoints {
            let _ = fail::cfg(failpoint.as_str(), "off");
        }
    }
}
