//! Reduction of a time bucket's values down to what a caller sees.

/// One of the five reduction methods a fetch can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Mean,
    Sum,
    Max,
    Min,
    Raw,
}

impl Aggregation {
    /// Parse the method name used in fetch requests. Unknown names are the
    /// caller's mistake, not ours to paper over, so this returns `None`
    /// rather than silently falling back to a default.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "mean" => Some(Self::Mean),
            "sum" => Some(Self::Sum),
            "max" => Some(Self::Max),
            "min" => Some(Self::Min),
            "raw" => Some(Self::Raw),
            _ => None,
        }
    }

    /// Reduce one time bucket's values. Total: every method produces a
    /// result for every input, including the empty list.
    pub(crate) fn reduce(self, values: &[f64]) -> Point {
        match self {
            Self::Mean => Point::Scalar(if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }),
            Self::Sum => Point::Scalar(Some(values.iter().sum())),
            Self::Max => Point::Scalar(values.iter().copied().fold(None, |acc, v| {
                Some(acc.map_or(v, |a: f64| a.max(v)))
            })),
            Self::Min => Point::Scalar(values.iter().copied().fold(None, |acc, v| {
                Some(acc.map_or(v, |a: f64| a.min(v)))
            })),
            Self::Raw => Point::Raw(values.to_vec()),
        }
    }
}

/// A single reduced bucket in a fetch result's series.
///
/// `Scalar(None)` is a densified hole: no rows landed in that bucket (or,
/// for `min`/`max`, the bucket was non-empty but yielded no sensible
/// extremum, which cannot actually happen since a non-empty `f64` list
/// always has one). `Raw` carries the bucket's whole value list instead of
/// a single number, since `raw` is the one method that doesn't reduce.
#[derive(Debug, Clone, PartialEq)]
pub enum Point {
    Scalar(Option<f64>),
    Raw(Vec<f64>),
}
