use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Nested document
// ────────────────────────────────────────────────────────────────────────────

fn new_entry_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalInfo {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub linkedin: String,
    pub website: String,
    pub photo_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Experience {
    pub id: String,
    pub company: String,
    pub position: String,
    pub location: String,
    pub start_date: String,
    pub end_date: String,
    pub current: bool,
    pub description: String,
}

impl Default for Experience {
    fn default() -> Self {
        Self {
            id: new_entry_id(),
            company: String::new(),
            position: String::new(),
            location: String::new(),
            start_date: String::new(),
            end_date: String::new(),
            current: false,
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Education {
    pub id: String,
    pub institution: String,
    pub degree: String,
    pub field: String,
    pub start_date: String,
    pub end_date: String,
    pub gpa: String,
    pub description: String,
}

impl Default for Education {
    fn default() -> Self {
        Self {
            id: new_entry_id(),
            institution: String::new(),
            degree: String::new(),
            field: String::new(),
            start_date: String::new(),
            end_date: String::new(),
            gpa: String::new(),
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub level: String,
    pub category: String,
}

impl Default for Skill {
    fn default() -> Self {
        Self {
            id: new_entry_id(),
            name: String::new(),
            level: "intermediate".to_string(),
            category: "technical".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Language {
    pub id: String,
    pub name: String,
    pub proficiency: String,
}

impl Default for Language {
    fn default() -> Self {
        Self {
            id: new_entry_id(),
            name: String::new(),
            proficiency: "professional".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Certificate {
    pub id: String,
    pub name: String,
    pub issuer: String,
    pub date: String,
    pub url: String,
}

impl Default for Certificate {
    fn default() -> Self {
        Self {
            id: new_entry_id(),
            name: String::new(),
            issuer: String::new(),
            date: String::new(),
            url: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub url: String,
    pub technologies: Vec<String>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            id: new_entry_id(),
            name: String::new(),
            description: String::new(),
            url: String::new(),
            technologies: Vec::new(),
        }
    }
}

/// Section keys in their default display order.
pub const DEFAULT_SECTION_ORDER: &[&str] = &[
    "summary",
    "experience",
    "education",
    "skills",
    "languages",
    "certificates",
    "projects",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvData {
    pub personal_info: PersonalInfo,
    pub summary: String,
    pub experiences: Vec<Experience>,
    pub education: Vec<Education>,
    pub skills: Vec<Skill>,
    pub languages: Vec<Language>,
    pub certificates: Vec<Certificate>,
    pub projects: Vec<Project>,
    pub section_order: Vec<String>,
}

impl Default for CvData {
    fn default() -> Self {
        Self {
            personal_info: PersonalInfo::default(),
            summary: String::new(),
            experiences: Vec::new(),
            education: Vec::new(),
            skills: Vec::new(),
            languages: Vec::new(),
            certificates: Vec::new(),
            projects: Vec::new(),
            section_order: DEFAULT_SECTION_ORDER.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Display settings
// ────────────────────────────────────────────────────────────────────────────

pub const DEFAULT_PRIMARY_COLOR: &str = "#064E3B";
pub const DEFAULT_FONT_FAMILY: &str = "Plus Jakarta Sans";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvSettings {
    pub template: String,
    pub primary_color: String,
    pub font_family: String,
    pub show_photo: bool,
    pub visible_sections: BTreeMap<String, bool>,
}

impl Default for CvSettings {
    fn default() -> Self {
        Self {
            template: "minimal".to_string(),
            primary_color: DEFAULT_PRIMARY_COLOR.to_string(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            show_photo: true,
            visible_sections: DEFAULT_SECTION_ORDER
                .iter()
                .map(|s| (s.to_string(), true))
                .collect(),
        }
    }
}

impl CvSettings {
    /// Sections missing from the map are shown.
    pub fn is_visible(&self, section: &str) -> bool {
        self.visible_sections.get(section).copied().unwrap_or(true)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CV record
// ────────────────────────────────────────────────────────────────────────────

pub const DEFAULT_CV_TITLE: &str = "Untitled CV";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cv {
    pub cv_id: String,
    pub user_id: String,
    pub title: String,
    pub data: CvData,
    pub settings: CvSettings,
    pub is_pro: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cv {
    pub fn new(user_id: &str, title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            cv_id: format!("cv_{}", &Uuid::new_v4().simple().to_string()[..12]),
            user_id: user_id.to_string(),
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CV_TITLE.to_string()),
            data: CvData::default(),
            settings: CvSettings::default(),
            is_pro: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CvCreate {
    pub title: Option<String>,
}

/// Partial update. Only the provided top-level fields overwrite; `data` and
/// `settings` replace the stored value wholesale.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CvUpdate {
    pub title: Option<String>,
    pub data: Option<CvData>,
    pub settings: Option<CvSettings>,
}

impl CvUpdate {
    pub fn apply_to(self, cv: &mut Cv, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            cv.title = title;
        }
        if let Some(data) = self.data {
            cv.data = data;
        }
        if let Some(settings) = self.settings {
            cv.settings = settings;
        }
        cv.updated_at = now;
    }
}
