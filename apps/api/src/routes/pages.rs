//! Server-rendered HTML pages for the browser routes.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::annotate::AdaptedResume;
use crate::errors::AppError;
use crate::session::Flash;

const STYLE: &str = "body{font-family:sans-serif;max-width:760px;margin:2rem auto;padding:0 1rem;color:#222}\
.flash{padding:.6rem 1rem;border-radius:4px;margin-bottom:.6rem}\
.flash-error{background:#fde2e1;color:#8a1c1c}\
textarea{width:100%;min-height:12rem}table{border-collapse:collapse}td,th{padding:.3rem .8rem;text-align:left}\
.keyword{display:inline-block;background:#fff59d;padding:0 .4rem;margin:.15rem;border-radius:3px}";

/// Escape HTML special characters to prevent XSS
pub fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="fr">
<head>
<meta charset="utf-8">
<title>{title} | CV Analyzer</title>
<style>{STYLE}</style>
</head>
<body>
<header><h1><a href="/">CV Analyzer</a></h1></header>
<main>
{body}
</main>
</body>
</html>"#,
        title = html_escape(title),
    )
}

fn render_flashes(flashes: &[Flash]) -> String {
    flashes
        .iter()
        .map(|flash| {
            format!(
                r#"<div class="flash flash-{}">{}</div>"#,
                flash.level.as_str(),
                html_escape(&flash.message)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn index_page(flashes: &[Flash]) -> String {
    let body = format!(
        r#"{flashes}
<h2>Adaptez votre CV à une offre d'emploi</h2>
<p>Les mots-clés de l'offre seront mis en évidence dans votre CV (.docx ou .pdf).</p>
<form action="/upload" method="post" enctype="multipart/form-data">
  <p><label for="cv_file">Votre CV</label><br>
  <input type="file" id="cv_file" name="cv_file" accept=".docx,.pdf" required></p>
  <p><label for="job_description">Description du poste</label><br>
  <textarea id="job_description" name="job_description" required></textarea></p>
  <p><button type="submit">Adapter mon CV</button></p>
</form>"#,
        flashes = render_flashes(flashes),
    );
    layout("Adaptez votre CV", &body)
}

fn render_adaptation(adapted: &AdaptedResume) -> String {
    let stats = &adapted.stats;
    let mut rows = vec![
        ("Mots-clés recherchés", stats.total_keywords),
        ("Mots-clés mis en évidence", stats.highlighted_keywords),
    ];
    if let Some(paragraphs) = stats.paragraphs_modified {
        rows.push(("Paragraphes modifiés", paragraphs));
    }
    if let Some(pages) = stats.pages_modified {
        rows.push(("Pages modifiées", pages));
    }
    let table = rows
        .iter()
        .map(|(label, value)| format!("<tr><th>{label}</th><td>{value}</td></tr>"))
        .collect::<String>();

    let keywords = adapted
        .keywords
        .categories()
        .filter(|(_, words)| !words.is_empty())
        .map(|(category, words)| {
            let chips = words
                .keys()
                .map(|word| format!(r#"<span class="keyword">{}</span>"#, html_escape(word)))
                .collect::<String>();
            format!("<h4>{}</h4><p>{chips}</p>", category.as_str())
        })
        .collect::<String>();

    format!("<h3>Statistiques</h3><table>{table}</table><h3>Mots-clés</h3>{keywords}")
}

/// `adaptation` is shown only when it describes `filename`.
pub fn download_page(filename: &str, adaptation: Option<&AdaptedResume>) -> String {
    let details = adaptation
        .filter(|adapted| adapted.filename == filename)
        .map(render_adaptation)
        .unwrap_or_default();
    let body = format!(
        r#"<h2>Votre CV adapté est prêt</h2>
<p><a class="button" href="/get_file/{href}">Télécharger {name}</a></p>
{details}
<p><a href="/">Adapter un autre CV</a></p>"#,
        href = html_escape(filename),
        name = html_escape(filename),
    );
    layout("CV adapté", &body)
}

pub fn not_found_page() -> String {
    layout(
        "Page non trouvée",
        r#"<h2>Page non trouvée</h2><p>La page demandée n'existe pas.</p><p><a href="/">Retour à l'accueil</a></p>"#,
    )
}

pub fn server_error_page() -> String {
    layout(
        "Erreur interne",
        r#"<h2>Erreur interne du serveur</h2><p>Une erreur inattendue s'est produite.</p><p><a href="/">Retour à l'accueil</a></p>"#,
    )
}

/// `AppError` rendered as an HTML page for browser routes.
#[derive(Debug)]
pub struct HtmlError(pub AppError);

impl From<AppError> for HtmlError {
    fn from(err: AppError) -> Self {
        HtmlError(err)
    }
}

impl From<anyhow::Error> for HtmlError {
    fn from(err: anyhow::Error) -> Self {
        HtmlError(AppError::Internal(err))
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        match self.0 {
            AppError::NotFound(what) => {
                tracing::info!("Page not found: {what}");
                (StatusCode::NOT_FOUND, Html(not_found_page())).into_response()
            }
            other => {
                tracing::error!("Browser route failed: {other:?}");
                (other.status(), Html(server_error_page())).into_response()
            }
        }
    }
}

/// Fallback for unknown routes.
pub async fn handle_not_found() -> HtmlError {
    HtmlError(AppError::NotFound("route".to_string()))
}
