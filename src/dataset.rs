use std::{
    error::Error,
    fmt::{self, Display},
    fs, io,
    path::Path,
};

use ndarray::Array2;

/// Errors produced while loading feature files.
#[derive(Debug)]
pub enum DataError {
    Io(io::Error),

    /// The file name carries no recognizable letter code.
    UnknownClass { file: String },

    /// A feature value could not be parsed as a number.
    BadNumber { file: String, reason: String },

    /// The file holds a different number of features than configured.
    WrongLength {
        file: String,
        got: usize,
        expected: usize,
    },
}

impl Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::Io(e) => write!(f, "io error: {e}"),
            DataError::UnknownClass { file } => {
                write!(f, "{file}: file name carries no known letter code")
            }
            DataError::BadNumber { file, reason } => {
                write!(f, "{file}: bad feature value: {reason}")
            }
            DataError::WrongLength {
                file,
                got,
                expected,
            } => {
                write!(f, "{file}: got {got} features, expected {expected}")
            }
        }
    }
}

impl Error for DataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DataError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for DataError {
    fn from(e: io::Error) -> Self {
        DataError::Io(e)
    }
}

/// Letter classes the classifier distinguishes.
///
/// Feature files embed the hex character code of their letter after a
/// `train_` marker: `train_5a` is 'Z', `train_53` is 'S', `train_58` is 'X'.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Letter {
    Z,
    S,
    X,
}

impl Letter {
    /// Recovers the letter class from a feature file name, if any.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let rest = name.split("train_").nth(1)?;
        let code = rest.get(..2)?;
        match u8::from_str_radix(code, 16).ok()? {
            b'Z' => Some(Letter::Z),
            b'S' => Some(Letter::S),
            b'X' => Some(Letter::X),
            _ => None,
        }
    }
}

/// Loads one feature file: whitespace-separated numbers, one example per file.
///
/// # Returns
/// A 1×`feature_len` sample matrix.
///
/// # Errors
/// `DataError::WrongLength` when the count differs from `feature_len`, plus
/// I/O and parse failures.
pub fn load_sample(path: &Path, feature_len: usize) -> Result<Array2<f64>, DataError> {
    let file = path.display().to_string();
    let text = fs::read_to_string(path)?;

    let values = text
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|e| DataError::BadNumber {
            file: file.clone(),
            reason: e.to_string(),
        })?;

    if values.len() != feature_len {
        return Err(DataError::WrongLength {
            file,
            got: values.len(),
            expected: feature_len,
        });
    }

    // Length was just checked, reshaping a flat vec into one row cannot fail.
    Ok(Array2::from_shape_vec((1, feature_len), values).unwrap())
}
