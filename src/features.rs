//! Feature selection and model input construction.

use anyhow::bail;
use ndarray::{Array1, Array2};

use crate::data::{LearningData, RaceEntry};

/// Numeric fields of a race entry usable as model inputs or bucket keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Potential,
    Makikaeshi,
    L4f,
    T2f,
    FinishPosition,
    Popularity,
    Corner4,
    FieldSize,
    ForwardRate,
}

/// Classifier inputs, in matrix column order.
pub const MODEL_FEATURES: [Feature; 9] = [
    Feature::Potential,
    Feature::Makikaeshi,
    Feature::L4f,
    Feature::T2f,
    Feature::FinishPosition,
    Feature::Popularity,
    Feature::Corner4,
    Feature::FieldSize,
    Feature::ForwardRate,
];

impl Feature {
    #[allow(dead_code)]
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "potential" => Some(Feature::Potential),
            "makikaeshi" => Some(Feature::Makikaeshi),
            "L4F" => Some(Feature::L4f),
            "T2F" => Some(Feature::T2f),
            "finish_position" => Some(Feature::FinishPosition),
            "popularity" => Some(Feature::Popularity),
            "corner_4" => Some(Feature::Corner4),
            "field_size" => Some(Feature::FieldSize),
            "forward_rate" => Some(Feature::ForwardRate),
            _ => None,
        }
    }

    /// Column name in the learning data.
    pub fn name(&self) -> &'static str {
        match self {
            Feature::Potential => "potential",
            Feature::Makikaeshi => "makikaeshi",
            Feature::L4f => "L4F",
            Feature::T2f => "T2F",
            Feature::FinishPosition => "finish_position",
            Feature::Popularity => "popularity",
            Feature::Corner4 => "corner_4",
            Feature::FieldSize => "field_size",
            Feature::ForwardRate => "forward_rate",
        }
    }

    pub fn value(&self, entry: &RaceEntry) -> Option<f64> {
        match self {
            Feature::Potential => entry.potential,
            Feature::Makikaeshi => entry.makikaeshi,
            Feature::L4f => entry.l4f,
            Feature::T2f => entry.t2f,
            Feature::FinishPosition => entry.finish_position,
            Feature::Popularity => entry.popularity,
            Feature::Corner4 => entry.corner_4,
            Feature::FieldSize => entry.field_size,
            Feature::ForwardRate => entry.forward_rate,
        }
    }

    /// Whether a larger value is the stronger signal.
    ///
    /// The time indices (L4F, T2F) are lap times, so smaller is better.
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, Feature::L4f | Feature::T2f)
    }
}

/// Fail if any model feature is absent from every record.
pub fn ensure_columns(data: &LearningData, features: &[Feature]) -> anyhow::Result<()> {
    let missing: Vec<&str> = features
        .iter()
        .map(|f| f.name())
        .filter(|name| !data.has_column(name))
        .collect();

    if !missing.is_empty() {
        bail!("Learning data is missing feature columns: {}", missing.join(", "));
    }
    Ok(())
}

/// Build the model input matrix; missing values are imputed as 0.
pub fn build_matrix(entries: &[&RaceEntry], features: &[Feature]) -> Array2<f64> {
    Array2::from_shape_fn((entries.len(), features.len()), |(i, j)| {
        features[j].value(entries[i]).unwrap_or(0.0)
    })
}

/// Binary top-3 labels (1 = finished top 3 next race).
pub fn build_labels(entries: &[&RaceEntry]) -> Array1<u8> {
    entries.iter().map(|e| u8::from(e.is_top3())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_feature_names_round_trip() {
        for feature in MODEL_FEATURES {
            assert_eq!(Feature::from_name(feature.name()), Some(feature));
        }
        assert_eq!(Feature::from_name("l4f"), None);
        assert_eq!(Feature::from_name("unknown"), None);
    }

    #[test]
    fn test_direction() {
        assert!(Feature::Potential.higher_is_better());
        assert!(Feature::Makikaeshi.higher_is_better());
        assert!(!Feature::L4f.higher_is_better());
        assert!(!Feature::T2f.higher_is_better());
    }

    #[test]
    fn test_build_matrix_imputes_zero() {
        let a = RaceEntry {
            potential: Some(6.5),
            makikaeshi: Some(2.0),
            l4f: None,
            forward_rate: Some(0.4),
            next_finish: Some(2.0),
            ..Default::default()
        };
        let b = RaceEntry {
            potential: Some(1.0),
            makikaeshi: Some(0.0),
            l4f: Some(47.2),
            next_finish: Some(7.0),
            ..Default::default()
        };
        let entries = vec![&a, &b];

        let x = build_matrix(&entries, &MODEL_FEATURES);
        assert_eq!(x.dim(), (2, 9));
        assert_eq!(x[[0, 0]], 6.5);
        assert_eq!(x[[0, 2]], 0.0);
        assert_eq!(x[[0, 8]], 0.4);
        assert_eq!(x[[1, 2]], 47.2);
        assert_eq!(x[[1, 5]], 0.0);

        let y = build_labels(&entries);
        assert_eq!(y.to_vec(), vec![1, 0]);
    }

    #[test]
    fn test_ensure_columns() {
        let mut columns: BTreeSet<String> =
            MODEL_FEATURES.iter().map(|f| f.name().to_string()).collect();
        let data = LearningData {
            entries: Vec::new(),
            columns: columns.clone(),
        };
        assert!(ensure_columns(&data, &MODEL_FEATURES).is_ok());

        columns.remove("forward_rate");
        let data = LearningData {
            entries: Vec::new(),
            columns,
        };
        let err = ensure_columns(&data, &MODEL_FEATURES).unwrap_err();
        assert!(err.to_string().contains("forward_rate"));
    }
}
