use std::{env, path::PathBuf, str::FromStr};

use anyhow::{anyhow, Error, Result};

/// Domain points evaluated per precision level in test mode.
pub const TEST_POINT_LIMIT: usize = 4;

/// `full` sweeps every configured point; `test` runs a short prefix and checks
/// it against the stored benchmark.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ExperimentMode {
    #[default]
    Full,
    Test,
}

impl FromStr for ExperimentMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "full" => Ok(Self::Full),
            "test" => Ok(Self::Test),
            other => Err(anyhow!("invalid mode: {} (expected full or test)", other)),
        }
    }
}

impl ExperimentMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Test => "test",
        }
    }

    /// How many of `available` domain points this mode sweeps.
    pub fn point_limit(&self, available: usize) -> usize {
        match self {
            Self::Full => available,
            Self::Test => available.min(TEST_POINT_LIMIT),
        }
    }

    pub fn checks_benchmark(&self) -> bool {
        matches!(self, Self::Test)
    }
}

/// Command-line arguments shared by experiment binaries.
#[derive(Clone, Debug)]
pub struct ExperimentArgs {
    mode: ExperimentMode,
    config: Option<PathBuf>,
    help_requested: bool,
}

impl ExperimentArgs {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args().skip(1))
    }

    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut mode: Option<ExperimentMode> = None;
        let mut config: Option<PathBuf> = None;
        let mut help_requested = false;
        let mut iter = args.into_iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--mode" | "-m" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| anyhow!("expected value after {}", arg))?;
                    mode = Some(value.parse()?);
                }
                "--config" | "-c" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| anyhow!("expected value after {}", arg))?;
                    config = Some(PathBuf::from(value));
                }
                "--help" | "-h" => help_requested = true,
                s => {
                    if let Some(value) = s.strip_prefix("--mode=") {
                        mode = Some(value.parse()?);
                    } else if let Some(value) = s.strip_prefix("--config=") {
                        config = Some(PathBuf::from(value));
                    } else {
                        return Err(anyhow!("unexpected argument: {}", arg));
                    }
                }
            }
        }

        Ok(Self {
            mode: mode.unwrap_or_default(),
            config,
            help_requested,
        })
    }

    pub fn help_requested(&self) -> bool {
        self.help_requested
    }

    pub fn mode(&self) -> ExperimentMode {
        self.mode
    }

    /// Config path override, if one was given.
    pub fn config(&self) -> Option<&PathBuf> {
        self.config.as_ref()
    }
}
