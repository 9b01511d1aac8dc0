use serde::Deserialize;

use super::{require_code, require_text, ValidationError};

#[derive(Debug, Clone, Deserialize)]
pub struct NewIndustry {
    pub code: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl NewIndustry {
    pub fn normalized_code(&self) -> String {
        self.code.trim().to_lowercase()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_code("code", &self.normalized_code())?;
        require_text("name", &self.name, 100)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndustryUpdate {
    pub name: Option<String>,
    pub is_active: Option<bool>,
}

impl IndustryUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.name {
            Some(name) => require_text("name", name, 100),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPosition {
    pub code: String,
    pub name: String,
    pub industry_id: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NewPosition {
    pub fn normalized_code(&self) -> String {
        self.code.trim().to_lowercase()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_code("code", &self.normalized_code())?;
        require_text("name", &self.name, 100)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PositionUpdate {
    pub name: Option<String>,
    pub industry_id: Option<i64>,
    pub is_active: Option<bool>,
}

impl PositionUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.name {
            Some(name) => require_text("name", name, 100),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PositionFilter {
    pub industry_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn industry_code_is_lowercased_before_validation() {
        let industry = NewIndustry { code: " Retail ".into(), name: "Retail".into(), is_active: true };
        assert_eq!(industry.normalized_code(), "retail");
        assert!(industry.validate().is_ok());

        let bad = NewIndustry { code: "re tail".into(), ..industry };
        assert!(bad.validate().is_err());
    }
}
