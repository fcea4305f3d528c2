//! Resume flavour detection and the section headings each flavour expects.

/// A normalized section category onto which literal heading variants map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalHeading {
    Summary,
    Skills,
    TechnicalSkills,
    Experience,
    Projects,
    Education,
    Certifications,
    Coursework,
    Portfolio,
}

impl CanonicalHeading {
    pub const ALL: &'static [CanonicalHeading] = &[
        CanonicalHeading::Summary,
        CanonicalHeading::Skills,
        CanonicalHeading::TechnicalSkills,
        CanonicalHeading::Experience,
        CanonicalHeading::Projects,
        CanonicalHeading::Education,
        CanonicalHeading::Certifications,
        CanonicalHeading::Coursework,
        CanonicalHeading::Portfolio,
    ];

    /// Display name used in advisory tips.
    pub fn name(self) -> &'static str {
        match self {
            CanonicalHeading::Summary => "SUMMARY",
            CanonicalHeading::Skills => "SKILLS",
            CanonicalHeading::TechnicalSkills => "TECHNICAL SKILLS",
            CanonicalHeading::Experience => "EXPERIENCE",
            CanonicalHeading::Projects => "PROJECTS",
            CanonicalHeading::Education => "EDUCATION",
            CanonicalHeading::Certifications => "CERTIFICATIONS",
            CanonicalHeading::Coursework => "COURSEWORK",
            CanonicalHeading::Portfolio => "PORTFOLIO",
        }
    }

    /// Literal prefixes a scanned node's trimmed, lowercased text may start
    /// with to count as this heading.
    pub fn synonyms(self) -> &'static [&'static str] {
        match self {
            CanonicalHeading::Summary => &["summary", "profile"],
            CanonicalHeading::Skills => &["skills", "key skills"],
            CanonicalHeading::TechnicalSkills => &["technical skills", "tech skills"],
            CanonicalHeading::Experience => {
                &["experience", "work history", "professional experience"]
            }
            CanonicalHeading::Projects => &["projects", "selected projects"],
            CanonicalHeading::Education => &["education", "academic history"],
            CanonicalHeading::Certifications => &["certifications", "certificates", "licenses"],
            CanonicalHeading::Coursework => &["coursework", "relevant coursework"],
            CanonicalHeading::Portfolio => &["portfolio", "selected works"],
        }
    }

    /// Every canonical heading the given node text maps onto.
    pub fn matching(text: &str) -> Vec<CanonicalHeading> {
        let text = text.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .filter(|h| h.synonyms().iter().any(|s| text.starts_with(s)))
            .collect()
    }
}

/// Coarse resume category; parameterizes which headings the heuristics
/// engine treats as expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavour {
    Tech,
    Creative,
    Business,
    Student,
    Healthcare,
    General,
}

const TECH_KEYWORDS: &[&str] = &[
    "python",
    "docker",
    "kubernetes",
    "react",
    "aws",
    "ci/cd",
    "node",
    "sql",
];
const CREATIVE_KEYWORDS: &[&str] = &["photoshop", "illustrator", "figma", "premiere", "branding"];
const BUSINESS_KEYWORDS: &[&str] = &["kpi", "roi", "salesforce", "crm", "budgeting", "forecasting"];
const STUDENT_KEYWORDS: &[&str] = &[
    "gpa",
    "coursework",
    "bachelor",
    "master",
    "capstone",
    "thesis",
];
const HEALTHCARE_KEYWORDS: &[&str] = &["clinical", "patient care", "emr", "hipaa", "icu"];

/// Categories in declared detection order; the first keyword hit wins.
const DETECTION_ORDER: &[(Flavour, &[&str])] = &[
    (Flavour::Tech, TECH_KEYWORDS),
    (Flavour::Creative, CREATIVE_KEYWORDS),
    (Flavour::Business, BUSINESS_KEYWORDS),
    (Flavour::Student, STUDENT_KEYWORDS),
    (Flavour::Healthcare, HEALTHCARE_KEYWORDS),
];

impl Flavour {
    pub fn detect(plain: &str) -> Flavour {
        let lower = plain.to_lowercase();
        DETECTION_ORDER
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(flavour, _)| *flavour)
            .unwrap_or(Flavour::General)
    }

    /// Ordered headings a resume of this flavour is expected to carry.
    pub fn expected_headings(self) -> &'static [CanonicalHeading] {
        use CanonicalHeading::*;
        match self {
            Flavour::Tech => &[Summary, TechnicalSkills, Experience, Projects, Education],
            Flavour::Creative => &[Summary, Skills, Portfolio, Experience, Education],
            Flavour::Business => &[Summary, Skills, Experience, Education, Certifications],
            Flavour::Student => &[Summary, Education, Projects, Experience, Coursework],
            Flavour::Healthcare => &[Summary, Skills, Experience, Education, Certifications],
            Flavour::General => &[Summary, Skills, Experience, Education],
        }
    }
}
