//! CV to HTML. Text values pass through `sanitize_html`; style settings are
//! checked against a safe pattern.

use std::collections::HashSet;
use std::fmt::Write;

use crate::models::cv::{
    Cv, CvData, DEFAULT_FONT_FAMILY, DEFAULT_PRIMARY_COLOR, DEFAULT_SECTION_ORDER,
};
use crate::security::sanitize_html as esc;

pub const WATERMARK_TEXT: &str = "Created with Smart Resume Builder";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Minimal,
    Modern,
    Classic,
    Creative,
}

impl Template {
    /// Unknown names render as `Minimal`.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "modern" => Template::Modern,
            "classic" => Template::Classic,
            "creative" => Template::Creative,
            _ => Template::Minimal,
        }
    }

    /// Rules layered over the shared base stylesheet.
    fn styles(self, color: &str) -> String {
        match self {
            Template::Minimal => format!(
                ".header {{ text-align: center; border-bottom: 2px solid {color}; }}\n\
                 .section-title {{ border-bottom: 1px solid #e2e8f0; }}"
            ),
            Template::Modern => format!(
                ".header {{ text-align: left; background: {color}; padding: 24px; }}\n\
                 .header .name, .header .contact {{ color: #ffffff; }}\n\
                 .section-title {{ text-transform: uppercase; letter-spacing: 1px; }}"
            ),
            Template::Classic => format!(
                "body {{ font-family: Georgia, 'Times New Roman', serif; }}\n\
                 .header {{ text-align: center; border-bottom: 3px double {color}; }}\n\
                 .section-title {{ font-variant: small-caps; border-bottom: 1px solid {color}; }}"
            ),
            Template::Creative => format!(
                ".header {{ text-align: left; border-left: 8px solid {color}; padding-left: 16px; }}\n\
                 .section {{ border-left: 2px solid {color}; padding-left: 12px; }}\n\
                 .skill-tag {{ background: {color}; color: #ffffff; }}"
            ),
        }
    }
}

fn base_styles(color: &str, font: &str) -> String {
    format!(
        "* {{ margin: 0; padding: 0; box-sizing: border-box; }}\n\
         body {{ font-family: '{font}', Arial, Helvetica, sans-serif; font-size: 11pt; line-height: 1.5; color: #1e293b; padding: 40px; }}\n\
         .header {{ margin-bottom: 24px; padding-bottom: 16px; }}\n\
         .photo {{ width: 96px; height: 96px; border-radius: 48px; }}\n\
         .name {{ font-size: 24pt; font-weight: 700; color: {color}; margin-bottom: 8px; }}\n\
         .contact {{ font-size: 10pt; color: #64748b; }}\n\
         .contact span {{ margin: 0 8px; }}\n\
         .section {{ margin-bottom: 20px; page-break-inside: avoid; }}\n\
         .section-title {{ font-size: 14pt; font-weight: 600; color: {color}; padding-bottom: 4px; margin-bottom: 12px; }}\n\
         .summary {{ color: #475569; }}\n\
         .item {{ margin-bottom: 16px; page-break-inside: avoid; }}\n\
         .item-title {{ font-weight: 600; }}\n\
         .item-sub {{ color: #64748b; }}\n\
         .item-date {{ color: #94a3b8; font-size: 10pt; }}\n\
         .item-desc {{ color: #475569; font-size: 10pt; white-space: pre-wrap; }}\n\
         .skill-tag {{ background: #f1f5f9; padding: 4px 12px; border-radius: 16px; font-size: 10pt; display: inline-block; margin: 4px; }}\n\
         .watermark {{ position: fixed; bottom: 20px; right: 20px; opacity: 0.3; font-size: 10pt; color: #94a3b8; }}"
    )
}

fn section_open(out: &mut String, title: &str) {
    let _ = write!(
        out,
        "<div class=\"section\"><div class=\"section-title\">{title}</div>"
    );
}

fn date_range(start: &str, end: &str) -> String {
    match (start.is_empty(), end.is_empty()) {
        (true, true) => String::new(),
        (false, true) => esc(start),
        (true, false) => esc(end),
        (false, false) => format!("{} - {}", esc(start), esc(end)),
    }
}

/// Appends one section. Empty sections produce nothing.
fn render_section(out: &mut String, key: &str, data: &CvData) {
    match key {
        "summary" if !data.summary.trim().is_empty() => {
            section_open(out, "Professional Summary");
            let _ = write!(out, "<div class=\"summary\">{}</div></div>", esc(&data.summary));
        }
        "experience" if !data.experiences.is_empty() => {
            section_open(out, "Work Experience");
            for exp in &data.experiences {
                let end = if exp.current { "Present" } else { exp.end_date.as_str() };
                let _ = write!(
                    out,
                    "<div class=\"item\"><div><span class=\"item-title\">{}</span>\
                     <span class=\"item-sub\"> at {}</span></div>\
                     <div class=\"item-date\">{}</div>\
                     <div class=\"item-desc\">{}</div></div>",
                    esc(&exp.position),
                    esc(&exp.company),
                    date_range(&exp.start_date, end),
                    esc(&exp.description),
                );
            }
            out.push_str("</div>");
        }
        "education" if !data.education.is_empty() => {
            section_open(out, "Education");
            for edu in &data.education {
                let degree = if edu.field.is_empty() {
                    esc(&edu.degree)
                } else {
                    format!("{} in {}", esc(&edu.degree), esc(&edu.field))
                };
                let _ = write!(
                    out,
                    "<div class=\"item\"><div><span class=\"item-title\">{degree}</span>\
                     <span class=\"item-sub\"> - {}</span></div>\
                     <div class=\"item-date\">{}</div></div>",
                    esc(&edu.institution),
                    date_range(&edu.start_date, &edu.end_date),
                );
            }
            out.push_str("</div>");
        }
        "skills" if !data.skills.is_empty() => {
            section_open(out, "Skills");
            out.push_str("<div class=\"skills-list\">");
            for skill in &data.skills {
                let _ = write!(out, "<span class=\"skill-tag\">{}</span>", esc(&skill.name));
            }
            out.push_str("</div></div>");
        }
        "languages" if !data.languages.is_empty() => {
            section_open(out, "Languages");
            for lang in &data.languages {
                let _ = write!(
                    out,
                    "<div class=\"item\"><span class=\"item-title\">{}</span>\
                     <span class=\"item-sub\"> ({})</span></div>",
                    esc(&lang.name),
                    esc(&lang.proficiency),
                );
            }
            out.push_str("</div>");
        }
        "certificates" if !data.certificates.is_empty() => {
            section_open(out, "Certificates");
            for cert in &data.certificates {
                let _ = write!(
                    out,
                    "<div class=\"item\"><div><span class=\"item-title\">{}</span>\
                     <span class=\"item-sub\"> - {}</span></div>\
                     <div class=\"item-date\">{}</div></div>",
                    esc(&cert.name),
                    esc(&cert.issuer),
                    esc(&cert.date),
                );
            }
            out.push_str("</div>");
        }
        "projects" if !data.projects.is_empty() => {
            section_open(out, "Projects");
            for project in &data.projects {
                let technologies: Vec<String> = project.technologies.iter().map(|t| esc(t)).collect();
                let _ = write!(
                    out,
                    "<div class=\"item\"><div class=\"item-title\">{}</div>\
                     <div class=\"item-desc\">{}</div>\
                     <div class=\"item-date\">{}</div></div>",
                    esc(&project.name),
                    esc(&project.description),
                    technologies.join(", "),
                );
            }
            out.push_str("</div>");
        }
        _ => {}
    }
}

/// Section keys in render order: the CV's own order (unknown keys and
/// repeats dropped), or the default order when it lists nothing.
fn ordered_sections(data: &CvData) -> Vec<&str> {
    let source: Vec<&str> = if data.section_order.is_empty() {
        DEFAULT_SECTION_ORDER.to_vec()
    } else {
        data.section_order.iter().map(String::as_str).collect()
    };

    let mut seen = HashSet::new();
    source
        .into_iter()
        .filter(|key| DEFAULT_SECTION_ORDER.contains(key) && seen.insert(*key))
        .collect()
}

/// Settings land inside `<style>`, where HTML escaping does not apply.
/// Anything but a `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa` hex color is
/// replaced by the default.
fn css_color(value: &str) -> &str {
    let value = value.trim();
    match value.strip_prefix('#') {
        Some(hex)
            if matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            value
        }
        _ => DEFAULT_PRIMARY_COLOR,
    }
}

/// Font names are limited to letters, digits, spaces and hyphens.
fn css_font(value: &str) -> &str {
    let value = value.trim();
    let safe = !value.is_empty()
        && value.len() <= 64
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-');
    if safe {
        value
    } else {
        DEFAULT_FONT_FAMILY
    }
}

/// Full HTML document for `cv`. Output depends only on the inputs.
pub fn render_cv_html(cv: &Cv, is_pro: bool) -> String {
    let data = &cv.data;
    let settings = &cv.settings;
    let personal = &data.personal_info;
    let color = css_color(&settings.primary_color);
    let template = Template::from_name(&settings.template);

    let mut html = String::with_capacity(8 * 1024);
    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"><title>{}</title><style>\n{}\n{}\n</style></head><body>",
        esc(&cv.title),
        base_styles(color, css_font(&settings.font_family)),
        template.styles(color),
    );

    html.push_str("<div class=\"header\">");
    if settings.show_photo && !personal.photo_url.is_empty() {
        let _ = write!(html, "<img class=\"photo\" src=\"{}\" alt=\"\">", esc(&personal.photo_url));
    }
    let name = if personal.full_name.trim().is_empty() {
        "Your Name"
    } else {
        personal.full_name.as_str()
    };
    let _ = write!(html, "<div class=\"name\">{}</div><div class=\"contact\">", esc(name));
    for field in [
        &personal.email,
        &personal.phone,
        &personal.location,
        &personal.linkedin,
        &personal.website,
    ] {
        if !field.is_empty() {
            let _ = write!(html, "<span>{}</span>", esc(field));
        }
    }
    html.push_str("</div></div>");

    for key in ordered_sections(data) {
        if settings.is_visible(key) {
            render_section(&mut html, key, data);
        }
    }

    if !is_pro {
        let _ = write!(html, "<div class=\"watermark\">{WATERMARK_TEXT}</div>");
    }
    html.push_str("</body></html>");
    html
}

/// Title reduced to characters safe inside a quoted `filename=` parameter.
pub fn pdf_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.');
    if cleaned.is_empty() {
        "cv.pdf".to_string()
    } else {
        format!("{cleaned}.pdf")
    }
}
