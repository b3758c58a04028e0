use std::{
    collections::HashMap,
    error::Error,
    fmt::{self, Display},
    fs, io,
    path::Path,
};

use ndarray::{Array2, ArrayView2};
use ndarray_rand::RandomExt;
use rand::{Rng, distr::StandardUniform};

use crate::dataset::Letter;

const KEY_HIDDEN: &str = "MLP_H";
const KEY_OUTPUTS: &str = "MLP_NS";
const KEY_ITER_MAX: &str = "MLP_ITER_MAX";
const KEY_STEP: &str = "MLP_ALFA";
const KEY_FEATURE_LEN: &str = "MLP_X_LENGTH";
const KEY_LETTER_Z: &str = "MLP_LETTER_Z";
const KEY_LETTER_S: &str = "MLP_LETTER_S";
const KEY_LETTER_X: &str = "MLP_LETTER_X";
const KEY_WEIGHTS_A: &str = "MLP_RAND_A";
const KEY_WEIGHTS_B: &str = "MLP_RAND_B";

const DEFAULT_HIDDEN: usize = 3;
const DEFAULT_OUTPUTS: usize = 3;
const DEFAULT_ITER_MAX: usize = 1000;
const DEFAULT_STEP: f64 = 1.0;

/// Errors produced while loading a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),

    /// A line past the header does not follow the `KEY : VALUE` format.
    Malformed { line: usize },

    /// A required key with no default is absent.
    MissingKey(&'static str),

    /// A value failed to parse or violates a documented shape constraint.
    InvalidValue {
        key: &'static str,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "io error: {e}"),
            ConfigError::Malformed { line } => {
                write!(f, "line {line} is not a `KEY : VALUE` entry")
            }
            ConfigError::MissingKey(key) => write!(f, "required key {key} is missing"),
            ConfigError::InvalidValue { key, reason } => {
                write!(f, "invalid value for {key}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

/// Hyperparameters and initial state for one training run.
///
/// Loaded from a `KEY : VALUE` file (first line is a header). Missing keys
/// with a documented default are resolved and the default is appended back to
/// the file, so the next run reads the exact same inputs — including the
/// initial weight matrices, which are drawn once and then pinned on disk.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Number of hidden units (`MLP_H`, default 3).
    pub hidden_units: usize,
    /// Number of output units (`MLP_NS`, default 3).
    pub output_units: usize,
    /// Iteration budget per run (`MLP_ITER_MAX`, default 1000).
    pub iter_max: usize,
    /// Legacy fixed step size (`MLP_ALFA`, default 1.0). The line search
    /// supersedes it; it is carried for reporting only.
    pub initial_step: f64,
    /// Feature dimensionality of every sample (`MLP_X_LENGTH`, required).
    pub feature_len: usize,
    /// Initial weight matrices, H×(ne+1) and ns×(H+1).
    pub initial_weights: (Array2<f64>, Array2<f64>),

    target_z: Vec<f64>,
    target_s: Vec<f64>,
    target_x: Vec<f64>,
}

impl TrainConfig {
    /// Reads the configuration at `path`, resolving defaults and appending
    /// them back to the file.
    ///
    /// # Arguments
    /// * `path` - The `KEY : VALUE` file.
    /// * `rng` - Source for the initial weight draw when the file does not
    ///   pin the matrices yet.
    ///
    /// # Errors
    /// I/O failures, malformed lines, a missing `MLP_X_LENGTH`, unparsable
    /// values, and shape/length violations between the fields.
    pub fn load<R: Rng>(path: &Path, rng: &mut R) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let entries = parse_entries(&text)?;
        let mut appended: Vec<String> = Vec::new();

        let hidden_units = match entries.get(KEY_HIDDEN) {
            Some(raw) => parse_usize(KEY_HIDDEN, raw)?,
            None => {
                appended.push(format!("{KEY_HIDDEN} : {DEFAULT_HIDDEN}"));
                DEFAULT_HIDDEN
            }
        };
        let output_units = match entries.get(KEY_OUTPUTS) {
            Some(raw) => parse_usize(KEY_OUTPUTS, raw)?,
            None => {
                appended.push(format!("{KEY_OUTPUTS} : {DEFAULT_OUTPUTS}"));
                DEFAULT_OUTPUTS
            }
        };
        let iter_max = match entries.get(KEY_ITER_MAX) {
            Some(raw) => parse_usize(KEY_ITER_MAX, raw)?,
            None => {
                appended.push(format!("{KEY_ITER_MAX} : {DEFAULT_ITER_MAX}"));
                DEFAULT_ITER_MAX
            }
        };
        let initial_step = match entries.get(KEY_STEP) {
            Some(raw) => parse_f64(KEY_STEP, raw)?,
            None => {
                appended.push(format!("{KEY_STEP} : {DEFAULT_STEP}"));
                DEFAULT_STEP
            }
        };
        let feature_len = match entries.get(KEY_FEATURE_LEN) {
            Some(raw) => parse_usize(KEY_FEATURE_LEN, raw)?,
            None => return Err(ConfigError::MissingKey(KEY_FEATURE_LEN)),
        };

        let mut resolve_target = |key: &'static str, default: &[f64]| match entries.get(key) {
            Some(raw) => parse_vector(key, raw),
            None => {
                appended.push(format!("{key} : {}", format_vector(default)));
                Ok(default.to_vec())
            }
        };
        let target_z = resolve_target(KEY_LETTER_Z, &[1.0, 0.0, 0.0])?;
        let target_s = resolve_target(KEY_LETTER_S, &[0.0, 1.0, 0.0])?;
        let target_x = resolve_target(KEY_LETTER_X, &[0.0, 0.0, 1.0])?;

        let weights_a = match entries.get(KEY_WEIGHTS_A) {
            Some(raw) => parse_matrix(KEY_WEIGHTS_A, raw)?,
            None => {
                let drawn =
                    Array2::random_using((hidden_units, feature_len + 1), StandardUniform, rng);
                appended.push(format!("{KEY_WEIGHTS_A} : {}", format_matrix(drawn.view())));
                drawn
            }
        };
        let weights_b = match entries.get(KEY_WEIGHTS_B) {
            Some(raw) => parse_matrix(KEY_WEIGHTS_B, raw)?,
            None => {
                let drawn =
                    Array2::random_using((output_units, hidden_units + 1), StandardUniform, rng);
                appended.push(format!("{KEY_WEIGHTS_B} : {}", format_matrix(drawn.view())));
                drawn
            }
        };

        let config = Self {
            hidden_units,
            output_units,
            iter_max,
            initial_step,
            feature_len,
            initial_weights: (weights_a, weights_b),
            target_z,
            target_s,
            target_x,
        };
        config.validate()?;

        if !appended.is_empty() {
            append_entries(path, &text, &appended)?;
        }
        Ok(config)
    }

    /// Target vector for a letter class.
    pub fn target(&self, letter: Letter) -> &[f64] {
        match letter {
            Letter::Z => &self.target_z,
            Letter::S => &self.target_s,
            Letter::X => &self.target_x,
        }
    }

    /// Target vector for a letter class as a 1×ns matrix.
    pub fn target_row(&self, letter: Letter) -> Array2<f64> {
        let target = self.target(letter);
        Array2::from_shape_vec((1, target.len()), target.to_vec()).unwrap()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, target) in [
            (KEY_LETTER_Z, &self.target_z),
            (KEY_LETTER_S, &self.target_s),
            (KEY_LETTER_X, &self.target_x),
        ] {
            if target.len() != self.output_units {
                return Err(ConfigError::InvalidValue {
                    key,
                    reason: format!(
                        "target has {} entries, {} output units configured",
                        target.len(),
                        self.output_units
                    ),
                });
            }
        }

        let (a, b) = &self.initial_weights;
        if a.dim() != (self.hidden_units, self.feature_len + 1) {
            return Err(ConfigError::InvalidValue {
                key: KEY_WEIGHTS_A,
                reason: format!(
                    "matrix is {:?}, expected {:?}",
                    a.dim(),
                    (self.hidden_units, self.feature_len + 1)
                ),
            });
        }
        if b.dim() != (self.output_units, self.hidden_units + 1) {
            return Err(ConfigError::InvalidValue {
                key: KEY_WEIGHTS_B,
                reason: format!(
                    "matrix is {:?}, expected {:?}",
                    b.dim(),
                    (self.output_units, self.hidden_units + 1)
                ),
            });
        }
        Ok(())
    }
}

/// Parses every `KEY : VALUE` line past the header into a map. Unknown keys
/// are kept so other tools' entries pass through untouched.
fn parse_entries(text: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut entries = HashMap::new();
    for (idx, line) in text.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(" : ") else {
            return Err(ConfigError::Malformed { line: idx + 1 });
        };
        entries.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(entries)
}

fn append_entries(path: &Path, current: &str, appended: &[String]) -> Result<(), ConfigError> {
    let mut addition = String::new();
    if !current.is_empty() && !current.ends_with('\n') {
        addition.push('\n');
    }
    for line in appended {
        addition.push_str(line);
        addition.push('\n');
    }
    let mut text = current.to_string();
    text.push_str(&addition);
    fs::write(path, text)?;
    Ok(())
}

fn parse_usize(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    raw.parse().map_err(|e: std::num::ParseIntError| {
        ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
        }
    })
}

fn parse_f64(key: &'static str, raw: &str) -> Result<f64, ConfigError> {
    raw.parse().map_err(|e: std::num::ParseFloatError| {
        ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
        }
    })
}

/// Comma-separated vector of numbers.
fn parse_vector(key: &'static str, raw: &str) -> Result<Vec<f64>, ConfigError> {
    raw.split(',')
        .map(|entry| parse_f64(key, entry.trim()))
        .collect()
}

/// Matrix serialized as `;`-separated rows of `,`-separated entries.
fn parse_matrix(key: &'static str, raw: &str) -> Result<Array2<f64>, ConfigError> {
    let rows = raw
        .split(';')
        .map(|row| parse_vector(key, row))
        .collect::<Result<Vec<_>, _>>()?;

    let ncols = rows.first().map(Vec::len).unwrap_or_default();
    if ncols == 0 || rows.iter().any(|row| row.len() != ncols) {
        return Err(ConfigError::InvalidValue {
            key,
            reason: "rows are empty or ragged".to_string(),
        });
    }

    let nrows = rows.len();
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Ok(Array2::from_shape_vec((nrows, ncols), flat).unwrap())
}

fn format_vector(values: &[f64]) -> String {
    values
        .iter()
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn format_matrix(m: ArrayView2<f64>) -> String {
    m.rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .map(f64::to_string)
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn temp_config(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "mlp_trainer_cfg_{}_{name}.txt",
            std::process::id()
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn fully_specified_file_is_read_verbatim() {
        let path = temp_config(
            "full",
            "# header\n\
             MLP_H : 2\n\
             MLP_NS : 2\n\
             MLP_ITER_MAX : 50\n\
             MLP_ALFA : 0.5\n\
             MLP_X_LENGTH : 3\n\
             MLP_LETTER_Z : 1,0\n\
             MLP_LETTER_S : 0,1\n\
             MLP_LETTER_X : 1,1\n\
             MLP_RAND_A : 0.1,0.2,0.3,0.4;0.5,0.6,0.7,0.8\n\
             MLP_RAND_B : 0.1,0.2,0.3;0.4,0.5,0.6\n",
        );
        let before = fs::read_to_string(&path).unwrap();

        let config = TrainConfig::load(&path, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(config.hidden_units, 2);
        assert_eq!(config.output_units, 2);
        assert_eq!(config.iter_max, 50);
        assert_eq!(config.initial_step, 0.5);
        assert_eq!(config.feature_len, 3);
        assert_eq!(config.target(Letter::S), &[0.0, 1.0]);
        assert_eq!(config.initial_weights.0.dim(), (2, 4));
        assert_eq!(config.initial_weights.1[(1, 2)], 0.6);

        // Nothing was missing, so nothing was written back.
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn defaults_are_applied_and_pinned_back_to_the_file() {
        let path = temp_config("defaults", "# header\nMLP_X_LENGTH : 4\n");

        let first = TrainConfig::load(&path, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(first.hidden_units, DEFAULT_HIDDEN);
        assert_eq!(first.iter_max, DEFAULT_ITER_MAX);
        assert_eq!(first.target(Letter::Z), &[1.0, 0.0, 0.0]);
        assert_eq!(first.initial_weights.0.dim(), (3, 5));

        // A second load with a different rng sees the pinned entries, weight
        // matrices included.
        let second = TrainConfig::load(&path, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(second.initial_weights.0, first.initial_weights.0);
        assert_eq!(second.initial_weights.1, first.initial_weights.1);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_feature_length_is_an_error() {
        let path = temp_config("nolen", "# header\nMLP_H : 3\n");
        let err = TrainConfig::load(&path, &mut StdRng::seed_from_u64(2)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(KEY_FEATURE_LEN)));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn target_length_must_match_output_units() {
        let path = temp_config(
            "badtarget",
            "# header\nMLP_X_LENGTH : 2\nMLP_NS : 2\nMLP_LETTER_Z : 1,0,0\n",
        );
        let err = TrainConfig::load(&path, &mut StdRng::seed_from_u64(3)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: KEY_LETTER_Z, .. }
        ));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn malformed_lines_are_rejected_with_their_number() {
        let path = temp_config("malformed", "# header\nMLP_X_LENGTH : 2\nnot an entry\n");
        let err = TrainConfig::load(&path, &mut StdRng::seed_from_u64(4)).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { line: 3 }));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn matrix_serialization_round_trips() {
        let m = Array2::from_shape_vec((2, 3), vec![0.125, 1.5, -2.0, 0.0, 3.25, 0.5]).unwrap();
        let parsed = parse_matrix("MLP_RAND_A", &format_matrix(m.view())).unwrap();
        assert_eq!(parsed, m);
    }

    #[test]
    fn ragged_matrices_are_rejected() {
        let err = parse_matrix("MLP_RAND_A", "1,2;3").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
