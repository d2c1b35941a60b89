use serde::{Deserialize, Serialize};

/// One job listing. Fields that could not be found on the page are `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Option<String>,
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub location: Option<String>,
    pub required_experience: Option<String>,
    /// Name of the category the listing was found under.
    pub job_market: String,
    pub description: Option<String>,
    pub required_skills: Option<String>,
}
