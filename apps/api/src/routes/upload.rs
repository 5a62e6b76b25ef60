//! Browser flow: upload form, résumé adaptation, download page, file retrieval.

use std::io::ErrorKind;

use axum::{
    extract::{
        multipart::{Multipart, MultipartError},
        Path, State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use bytes::Bytes;
use serde_json::json;
use uuid::Uuid;

use super::pages::{self, HtmlError};
use crate::annotate::{adapt_resume, DocumentKind};
use crate::errors::AppError;
use crate::session::{FlashLevel, Session};
use crate::state::AppState;

const FILE_FIELD: &str = "cv_file";
const DESCRIPTION_FIELD: &str = "job_description";

const MSG_NO_FILE: &str = "Aucun fichier sélectionné";
const MSG_BAD_FORMAT: &str =
    "Format de fichier non autorisé. Veuillez télécharger un fichier .docx ou .pdf";
const MSG_NO_DESCRIPTION: &str = "Veuillez entrer une description de poste";

struct UploadedFile {
    filename: String,
    bytes: Bytes,
}

#[derive(Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    job_description: String,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, MultipartError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILE_FIELD => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                form.file = Some(UploadedFile { filename, bytes });
            }
            DESCRIPTION_FIELD => form.job_description = field.text().await?,
            _ => {}
        }
    }
    Ok(form)
}

/// Keeps ASCII letters, digits, `.`, `-`, `_`; whitespace runs become `_`;
/// directories and leading dots/underscores are dropped.
pub fn sanitize_filename(original: &str) -> String {
    let base = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let mut out = String::with_capacity(base.len());
    let mut pending_space = false;
    for c in base.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')) {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push('_');
        }
        pending_space = false;
        out.push(c);
    }

    let trimmed = out.trim_start_matches(['.', '_']);
    if trimmed.is_empty() {
        "resume".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<32 hex>_<sanitised name>`, always ending in the extension of `kind`.
pub fn upload_filename(original: &str, kind: DocumentKind) -> String {
    let mut name = sanitize_filename(original);
    if DocumentKind::from_filename(&name) != Some(kind) {
        name.push('.');
        name.push_str(kind.extension());
    }
    format!("{}_{name}", Uuid::new_v4().simple())
}

/// Generated files only: no directories, no parent references.
fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains("..")
}

async fn redirect_with_flash(
    state: &AppState,
    mut session: Session,
    message: impl Into<String>,
) -> Result<Response, HtmlError> {
    session.flash(FlashLevel::Error, message);
    let cookie = session.commit(state).await?;
    Ok((cookie, Redirect::to("/")).into_response())
}

/// GET /
pub async fn handle_index(
    State(state): State<AppState>,
    mut session: Session,
) -> Result<Response, HtmlError> {
    let flashes = session.take_flashes();
    let cookie = session.commit(&state).await?;
    Ok((cookie, Html(pages::index_page(&flashes))).into_response())
}

/// POST /upload
///
/// Multipart fields `cv_file` and `job_description`. Validation failures flash
/// a message and redirect to the form; success redirects to the download page.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut session: Session,
    multipart: Multipart,
) -> Result<Response, HtmlError> {
    tracing::info!("Résumé adaptation requested");

    let form = match read_upload_form(multipart).await {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!("Rejected multipart upload: {e}");
            return Ok(e.into_response());
        }
    };

    let Some(file) = form.file else {
        tracing::warn!("No '{FILE_FIELD}' field in upload");
        session.flash(FlashLevel::Error, MSG_NO_FILE);
        let cookie = session.commit(&state).await?;
        return Ok((
            StatusCode::BAD_REQUEST,
            cookie,
            Json(json!({ "error": "No file provided" })),
        )
            .into_response());
    };

    if file.filename.is_empty() {
        tracing::warn!("Empty file name in upload");
        return redirect_with_flash(&state, session, MSG_NO_FILE).await;
    }

    let Some(kind) = DocumentKind::from_filename(&file.filename) else {
        tracing::warn!("Disallowed file format: {}", file.filename);
        return redirect_with_flash(&state, session, MSG_BAD_FORMAT).await;
    };

    if form.job_description.trim().is_empty() {
        tracing::warn!("Empty job description");
        return redirect_with_flash(&state, session, MSG_NO_DESCRIPTION).await;
    }

    let stored_name = upload_filename(&file.filename, kind);
    let input = state.storage.upload_file_path(&stored_name);
    if let Err(e) = tokio::fs::write(&input, &file.bytes).await {
        tracing::error!("Failed to save upload {}: {e}", input.display());
        return redirect_with_flash(
            &state,
            session,
            format!("Erreur lors du traitement du fichier: {e}"),
        )
        .await;
    }
    tracing::info!("Upload saved: {}", input.display());

    let output_dir = state.storage.downloads_dir().to_path_buf();
    let options = state.annotate_options;
    let job_description = form.job_description;
    let result = tokio::task::spawn_blocking(move || {
        adapt_resume(&input, &job_description, &output_dir, &options)
    })
    .await
    .map_err(|e| anyhow::anyhow!("adaptation task failed: {e}"))?;

    match result {
        Ok(adapted) => {
            tracing::info!(
                "Résumé adapted: {} ({} keywords highlighted)",
                adapted.filename,
                adapted.stats.highlighted_keywords
            );
            let location = format!("/download/{}", adapted.filename);
            session.set_last_adaptation(adapted);
            let cookie = session.commit(&state).await?;
            Ok((cookie, Redirect::to(&location)).into_response())
        }
        Err(e) => {
            tracing::error!("Résumé adaptation failed: {e}");
            redirect_with_flash(
                &state,
                session,
                format!("Erreur lors du traitement du fichier: {e}"),
            )
            .await
        }
    }
}

/// GET /download/:filename
pub async fn handle_download_page(
    State(state): State<AppState>,
    session: Session,
    Path(filename): Path<String>,
) -> Result<Html<String>, HtmlError> {
    if !is_safe_filename(&filename) || !state.storage.download_file_path(&filename).is_file() {
        return Err(AppError::NotFound(format!("download '{filename}'")).into());
    }
    tracing::info!("Download page for {filename}");
    Ok(Html(pages::download_page(
        &filename,
        session.last_adaptation(),
    )))
}

/// GET /get_file/:filename
///
/// Sends a generated file as an attachment.
pub async fn handle_get_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, HtmlError> {
    if !is_safe_filename(&filename) {
        return Err(AppError::NotFound(format!("file '{filename}'")).into());
    }

    let path = state.storage.download_file_path(&filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("file '{filename}'")).into())
        }
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("Failed to read {}", path.display()))
                .into())
        }
    };

    let content_type = match DocumentKind::from_filename(&filename) {
        Some(DocumentKind::Docx) => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some(DocumentKind::Pdf) => "application/pdf",
        None => "application/octet-stream",
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Mon CV  2024.docx"), "Mon_CV_2024.docx");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\cv.pdf"), "cv.pdf");
        assert_eq!(sanitize_filename(".hidden.pdf"), "hidden.pdf");
        assert_eq!(sanitize_filename("Expérience.docx"), "Exprience.docx");
        assert_eq!(sanitize_filename("ééé"), "resume");
    }

    #[test]
    fn test_upload_filename_keeps_extension() {
        let name = upload_filename("CV final.PDF", DocumentKind::Pdf);
        let (prefix, rest) = name.split_once('_').unwrap();
        assert_eq!(prefix.len(), 32);
        assert_eq!(rest, "CV_final.PDF");

        let name = upload_filename("é.docx", DocumentKind::Docx);
        assert!(name.ends_with("_docx.docx"));
    }

    #[test]
    fn test_safe_filename() {
        assert!(is_safe_filename("adapted_cv_abc.docx"));
        assert!(!is_safe_filename("../secret"));
        assert!(!is_safe_filename("a/b.pdf"));
        assert!(!is_safe_filename("a\\b.pdf"));
        assert!(!is_safe_filename(""));
    }
}
