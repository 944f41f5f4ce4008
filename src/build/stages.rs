/// One step of the simulated build pipeline.
#[derive(Debug, Clone, Copy)]
pub struct BuildStage {
    pub name: &'static str,
    pub log: &'static str,
}

pub const BUILD_STAGES: [BuildStage; 10] = [
    BuildStage {
        name: "Analyzing requirements",
        log: "Analyzing requirements and planning architecture",
    },
    BuildStage {
        name: "Project structure",
        log: "Setting up project structure",
    },
    BuildStage {
        name: "Data models",
        log: "Generating data models and database schema",
    },
    BuildStage {
        name: "User interface",
        log: "Building user interface components",
    },
    BuildStage {
        name: "Core features",
        log: "Implementing core features",
    },
    BuildStage {
        name: "Integrations",
        log: "Wiring up integrations and third-party services",
    },
    BuildStage {
        name: "Automated tests",
        log: "Running automated tests",
    },
    BuildStage {
        name: "Performance",
        log: "Optimizing performance",
    },
    BuildStage {
        name: "Packaging",
        log: "Packaging application",
    },
    BuildStage {
        name: "Delivery preparation",
        log: "Preparing delivery",
    },
];

/// Progress after finishing stage `index` (0-based), as a whole percentage.
pub fn stage_progress(index: usize) -> i64 {
    let len = BUILD_STAGES.len() as f64;
    (((index + 1) as f64) * 100.0 / len).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic_and_ends_at_100() {
        let progress: Vec<i64> = (0..BUILD_STAGES.len()).map(stage_progress).collect();
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(progress.first(), Some(&10));
        assert_eq!(progress.last(), Some(&100));
    }
}
