/// Roster import from CSV
///
/// Expected layout (header row required, fields without embedded commas):
///
/// ```text
/// Ho_Ten,Ten_Dang_Nhap,Mat_Khau,Chuc_Vu(MANAGER/EMPLOYEE)
/// Nguyen Van A,nhanvien1,123456,EMPLOYEE
/// ```
///
/// Bad rows never fail the batch; they are reported in [`ImportReport::skipped`].
/// Neither do rows the store refuses, see [`store_imported`].

use crate::auth::password::{hash_password, PasswordError};
use crate::gateway::Gateway;
use crate::models::user::{CreateUser, User, UserRole};
use csv::{ReaderBuilder, Trim};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

pub const TEMPLATE_HEADER: &str = "Ho_Ten,Ten_Dang_Nhap,Mat_Khau,Chuc_Vu(MANAGER/EMPLOYEE)";

/// Suggested download name for [`template_csv`]
pub const TEMPLATE_FILE_NAME: &str = "mau_nhap_nhan_vien.csv";

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Failed to hash imported password: {0}")]
    Password(#[from] PasswordError),
}

/// Why a row was not imported
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// Not a valid CSV record
    Unreadable,
    /// Fewer than three fields
    TooFewFields,
    /// Blank name, login name or password
    MissingField,
    /// Login name already used in the company or earlier in the file
    DuplicateUsername { username: String },
    /// Row was valid but the store rejected the write
    StoreFailed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRow {
    /// 1-based line in the uploaded file
    pub line: u64,
    pub reason: SkipReason,
}

/// A row that became a user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedRow {
    pub line: u64,
    pub user: User,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported: Vec<ImportedRow>,
    pub skipped: Vec<SkippedRow>,
}

/// Users written by [`store_imported`] and every row left out
#[derive(Debug, Clone, Default)]
pub struct StoredImport {
    pub stored: Vec<User>,
    /// Parse skips and store failures, ordered by line
    pub skipped: Vec<SkippedRow>,
}

/// `MANAGER` or `QUANLY` (any case) map to manager; anything else is an employee
pub fn parse_role(raw: Option<&str>) -> UserRole {
    match raw.map(|r| r.trim().to_uppercase()).as_deref() {
        Some("MANAGER") | Some("QUANLY") => UserRole::Manager,
        _ => UserRole::Employee,
    }
}

/// Builds users for the importer's company from CSV text
///
/// `existing` is the current company roster, used for duplicate detection.
/// Nothing is written; the caller stores [`ImportReport::imported`].
pub fn parse_roster_csv(
    input: &str,
    importer: &User,
    existing: &[User],
) -> Result<ImportReport, ImportError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input.as_bytes());

    let mut taken: HashSet<String> = existing
        .iter()
        .filter(|u| u.company_id == importer.company_id)
        .map(|u| u.username.clone())
        .collect();
    let mut report = ImportReport::default();

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                debug!(line, error = %e, "Skipping unreadable roster line");
                report.skipped.push(SkippedRow {
                    line,
                    reason: SkipReason::Unreadable,
                });
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        // A blank line inside a flexible reader comes back as one empty field.
        if record.iter().all(str::is_empty) {
            continue;
        }

        if record.len() < 3 {
            report.skipped.push(SkippedRow {
                line,
                reason: SkipReason::TooFewFields,
            });
            continue;
        }

        let name = &record[0];
        let username = &record[1];
        let password = &record[2];
        if name.is_empty() || username.is_empty() || password.is_empty() {
            report.skipped.push(SkippedRow {
                line,
                reason: SkipReason::MissingField,
            });
            continue;
        }

        if !taken.insert(username.to_string()) {
            report.skipped.push(SkippedRow {
                line,
                reason: SkipReason::DuplicateUsername {
                    username: username.to_string(),
                },
            });
            continue;
        }

        let user = User::for_company_of(
            importer,
            CreateUser {
                name: name.to_string(),
                username: username.to_string(),
                password_hash: hash_password(password)?,
                role: parse_role(record.get(3)),
            },
        );
        report.imported.push(ImportedRow { line, user });
    }

    debug!(
        imported = report.imported.len(),
        skipped = report.skipped.len(),
        "Parsed roster CSV"
    );

    Ok(report)
}

/// Writes parsed users one at a time
///
/// A failed write becomes a [`SkipReason::StoreFailed`] row and the remaining
/// users are still written.
pub async fn store_imported(gateway: &dyn Gateway, report: ImportReport) -> StoredImport {
    let mut outcome = StoredImport {
        stored: Vec::with_capacity(report.imported.len()),
        skipped: report.skipped,
    };

    for ImportedRow { line, user } in report.imported {
        match gateway.add_user(&user).await {
            Ok(()) => outcome.stored.push(user),
            Err(e) => {
                warn!(line, username = %user.username, error = %e, "Imported user not stored");
                outcome.skipped.push(SkippedRow {
                    line,
                    reason: SkipReason::StoreFailed {
                        message: e.to_string(),
                    },
                });
            }
        }
    }

    outcome.skipped.sort_by_key(|row| row.line);
    outcome
}

/// Header plus two example rows
pub fn template_csv() -> String {
    format!(
        "{}\nNguyen Van A,nhanvien1,123456,EMPLOYEE\nTran Van B,quanly1,123456,MANAGER\n",
        TEMPLATE_HEADER
    )
}
