//! Manual nutrition entry: one-line text commands of the form
//! `YYYY-MM-DD weight protein carbs fats calories`, with `-` to skip a
//! field and trailing fields optional.

use healthlog_core::FieldPatch;

use crate::error::{ServiceError, ServiceResult};

const USAGE: &str = "format: YYYY-MM-DD weight protein carbs fats calories \
                     (use '-' to skip a field, e.g. 2026-02-09 85.2 180 - 70 2100)";

#[derive(Clone, Debug, PartialEq)]
pub struct ManualEntry {
    pub date: String,
    pub weight_kg: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fats_g: Option<f64>,
    pub calories: Option<f64>,
}

impl ManualEntry {
    pub fn parse(text: &str) -> ServiceResult<Self> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() < 2 {
            return Err(ServiceError::Parse(USAGE.to_string()));
        }

        let date = tokens[0];
        healthlog_core::dates::parse_date(date)
            .map_err(|e| ServiceError::Parse(format!("{e}; {USAGE}")))?;

        let mut values = [None; 5];
        for (i, slot) in values.iter_mut().enumerate() {
            let Some(token) = tokens.get(i + 1) else { break };
            if *token == "-" {
                continue;
            }
            let parsed: f64 = token
                .parse()
                .map_err(|_| ServiceError::Parse(format!("not a number: {token:?}; {USAGE}")))?;
            *slot = Some(parsed);
        }

        Ok(Self {
            date: date.to_string(),
            weight_kg: values[0],
            protein_g: values[1],
            carbs_g: values[2],
            fats_g: values[3],
            calories: values[4],
        })
    }

    /// Plausibility warnings; never fatal, the entry still applies.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(w) = self.weight_kg
            && !(40.0..=200.0).contains(&w)
        {
            warnings.push(format!("weight {w}kg seems unusual (expected 40-200)"));
        }
        if let Some(c) = self.calories
            && c > 5000.0
        {
            warnings.push(format!("calories {c} seems high (>5000)"));
        }
        warnings
    }

    /// Nutrition-group patch with only the provided values.
    pub fn to_patch(&self) -> FieldPatch {
        let mut patch = FieldPatch::new();
        for (name, value) in [
            ("weight_kg", self.weight_kg),
            ("protein_g", self.protein_g),
            ("carbs_g", self.carbs_g),
            ("fats_g", self.fats_g),
            ("calories", self.calories),
        ] {
            if value.is_some() {
                patch.insert(name.to_string(), value);
            }
        }
        patch
    }
}
