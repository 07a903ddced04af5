// Prompt constants and CV serializers for the AI features.
// The JSON-only instruction comes from llm_client::prompts.

use std::fmt::Write;

use crate::models::cv::CvData;

pub const ANALYZE_SYSTEM: &str = r#"You are an expert CV/Resume analyst and career coach. Analyze the provided CV and return a JSON response with:
1. An overall score (0-100)
2. Breakdown scores for: content, formatting, keywords, ats_compatibility
3. List of strengths (max 5)
4. List of weaknesses with specific improvement suggestions (max 5)
5. Missing keywords that could improve ATS compatibility
6. Overall recommendations

Use this exact format:
{
    "overall_score": 78,
    "breakdown": {
        "content": 80,
        "formatting": 75,
        "keywords": 70,
        "ats_compatibility": 85
    },
    "strengths": ["Strong work experience", "Clear summary"],
    "weaknesses": [{"issue": "Weak action verbs", "suggestion": "Use stronger verbs like 'achieved', 'led'"}],
    "missing_keywords": ["project management", "agile"],
    "recommendations": ["Add more quantifiable achievements"]
}"#;

pub const IMPROVE_SYSTEM: &str = "You are an expert CV writer. Improve the provided text to be more \
    professional, impactful, and ATS-friendly. Use strong action verbs and quantify achievements \
    where possible. Return ONLY the improved text, nothing else. Keep it concise.";

pub const OPTIMIZE_SYSTEM: &str = r#"You are an expert ATS specialist and CV optimizer. Analyze the CV against the job description and provide:
1. Match percentage
2. Matched keywords found in both
3. Missing keywords that should be added
4. Specific suggestions to tailor the CV

Use this format:
{
    "match_percentage": 65,
    "matched_keywords": ["python", "leadership"],
    "missing_keywords": ["agile", "scrum"],
    "suggestions": [
        {"section": "summary", "suggestion": "Add mention of agile methodology experience"},
        {"section": "skills", "suggestion": "Add 'Scrum' and 'Kanban' to skills"}
    ],
    "optimized_summary": "Improved summary text here..."
}"#;

pub const SUGGEST_SKILLS_SYSTEM: &str = r#"You are a career expert. Based on the job title, suggest relevant technical and soft skills.
Use this format:
{
    "technical_skills": ["Python", "SQL", "AWS"],
    "soft_skills": ["Leadership", "Communication", "Problem-solving"]
}"#;

fn experience_lines(data: &CvData, out: &mut String) {
    let _ = writeln!(out, "Experience:");
    for e in &data.experiences {
        let _ = writeln!(out, "- {} at {}: {}", e.position, e.company, e.description);
    }
}

fn skill_line(data: &CvData, out: &mut String) {
    let names: Vec<&str> = data.skills.iter().map(|s| s.name.as_str()).collect();
    let _ = writeln!(out, "Skills: {}", names.join(", "));
}

/// Text view of the CV used by `analyze`.
pub fn analysis_prompt(data: &CvData) -> String {
    let mut cv = String::new();
    let info = &data.personal_info;
    let _ = writeln!(cv, "Personal Info: {}, {}", info.full_name, info.email);
    let _ = writeln!(cv, "Summary: {}", data.summary);
    experience_lines(data, &mut cv);
    let _ = writeln!(cv, "Education:");
    for e in &data.education {
        let _ = writeln!(cv, "- {} in {} from {}", e.degree, e.field, e.institution);
    }
    skill_line(data, &mut cv);

    format!("Analyze this CV:\n{cv}")
}

pub fn improve_prompt(section: &str, content: &str, context: Option<&str>) -> String {
    let mut prompt = format!("Section type: {section}\nOriginal content: {content}");
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        let _ = write!(prompt, "\nAdditional context: {context}");
    }
    prompt
}

pub fn optimize_prompt(data: &CvData, job_description: &str) -> String {
    let mut cv = String::new();
    let _ = writeln!(cv, "Summary: {}", data.summary);
    experience_lines(data, &mut cv);
    skill_line(data, &mut cv);

    format!("CV Content:\n{cv}\nJob Description:\n{job_description}")
}

pub fn suggest_skills_prompt(job_title: &str) -> String {
    format!("Suggest skills for: {job_title}")
}
