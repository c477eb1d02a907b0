//! Host tool availability, probed once per run.

use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;

#[cfg_attr(test, mockall::automock)]
trait ToolProbe {
    fn is_on_path(&self, program: &str) -> bool;
}

struct PathProbe;

impl ToolProbe for PathProbe {
    fn is_on_path(&self, program: &str) -> bool {
        std::env::var_os("PATH").is_some_and(|path| {
            std::env::split_paths(&path).any(|dir| dir.join(program).is_file())
        })
    }
}

/// Remembers which optional build tools exist on the host.
///
/// Each program is looked up on `PATH` at most once; later queries reuse
/// the first answer.
pub struct ToolAvailability {
    probe: Box<dyn ToolProbe>,
    known: RefCell<HashMap<String, bool>>,
}

impl ToolAvailability {
    /// Probes the host `PATH`.
    #[must_use]
    pub fn from_path() -> Self {
        Self::with_probe(Box::new(PathProbe))
    }

    /// Uses fixed answers; programs not listed are reported missing.
    #[must_use]
    pub fn fixed<'p>(answers: impl IntoIterator<Item = (&'p str, bool)>) -> Self {
        let known = answers
            .into_iter()
            .map(|(program, available)| (program.to_owned(), available))
            .collect();
        Self {
            probe: Box::new(NoProbe),
            known: RefCell::new(known),
        }
    }

    fn with_probe(probe: Box<dyn ToolProbe>) -> Self {
        Self {
            probe,
            known: RefCell::new(HashMap::new()),
        }
    }

    /// Returns whether `program` can be run.
    #[must_use]
    pub fn is_available(&self, program: &str) -> bool {
        if let Some(&available) = self.known.borrow().get(program) {
            return available;
        }
        let available = self.probe.is_on_path(program);
        debug!("{program} available: {available}");
        self.known
            .borrow_mut()
            .insert(program.to_owned(), available);
        available
    }

    /// Returns whether Ninja can be used as the CMake generator.
    #[must_use]
    pub fn is_ninja_available(&self) -> bool {
        self.is_available("ninja")
    }
}

struct NoProbe;

impl ToolProbe for NoProbe {
    fn is_on_path(&self, _program: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn probes_each_program_once() {
        let mut probe = MockToolProbe::new();
        probe
            .expect_is_on_path()
            .with(eq("ninja"))
            .times(1)
            .return_const(true);
        let tools = ToolAvailability::with_probe(Box::new(probe));

        assert!(tools.is_ninja_available());
        assert!(tools.is_ninja_available());
    }

    #[test]
    fn negative_answers_are_cached_too() {
        let mut probe = MockToolProbe::new();
        probe
            .expect_is_on_path()
            .with(eq("ccache"))
            .times(1)
            .return_const(false);
        let tools = ToolAvailability::with_probe(Box::new(probe));

        assert!(!tools.is_available("ccache"));
        assert!(!tools.is_available("ccache"));
    }

    #[test]
    fn fixed_answers_never_probe() {
        let tools = ToolAvailability::fixed([("ninja", true)]);

        assert!(tools.is_ninja_available());
        assert!(!tools.is_available("autoreconf"));
    }
}
