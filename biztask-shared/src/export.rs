/// Excel task report
///
/// The filtered task list becomes one worksheet with fixed Vietnamese headers.
/// User ids are resolved against the company roster; unknown ids render as
/// `N/A`.

use crate::calendar::ReportZone;
use crate::models::task::Task;
use crate::models::user::User;
use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

pub const SHEET_NAME: &str = "Danh sách công việc";

/// Header text and column width, in sheet order
pub const COLUMNS: [(&str, f64); 11] = [
    ("STT", 5.0),
    ("Tiêu đề công việc", 30.0),
    ("Mô tả chi tiết", 40.0),
    ("Trạng thái", 15.0),
    ("Độ ưu tiên", 10.0),
    ("Người giao", 20.0),
    ("Người nhận", 20.0),
    ("Ngày giao", 18.0),
    ("Hạn chót", 18.0),
    ("Ngày hoàn thành", 18.0),
    ("Đánh giá hạn", 15.0),
];

const UNKNOWN_USER: &str = "N/A";

/// Longest text an Excel cell holds, in characters
pub const MAX_CELL_CHARS: usize = 32_767;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Không có dữ liệu để xuất.")]
    NoData,

    #[error("Failed to write workbook: {0}")]
    Workbook(#[from] XlsxError),
}

/// One report line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub sequence: usize,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub creator: String,
    pub assignee: String,
    pub created_at: String,
    pub due_date: String,
    pub completed_at: String,
    pub verdict: String,
}

impl ExportRow {
    fn cells(&self) -> [String; 11] {
        [
            self.sequence.to_string(),
            self.title.clone(),
            self.description.clone(),
            self.status.clone(),
            self.priority.clone(),
            self.creator.clone(),
            self.assignee.clone(),
            self.created_at.clone(),
            self.due_date.clone(),
            self.completed_at.clone(),
            self.verdict.clone(),
        ]
    }
}

fn verdict(task: &Task, now: DateTime<Utc>) -> &'static str {
    if task.status.is_completed() {
        if task.is_late() {
            "Trễ hạn"
        } else {
            "Đúng hạn"
        }
    } else if task.is_overdue(now) {
        "Quá hạn"
    } else {
        "Trong hạn"
    }
}

/// Cuts text to [`MAX_CELL_CHARS`] characters
fn fit_cell(text: &str) -> String {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Turns tasks into report rows, keeping their order
///
/// Free text longer than an Excel cell allows is truncated.
pub fn build_rows(
    tasks: &[Task],
    users: &[User],
    zone: &ReportZone,
    now: DateTime<Utc>,
) -> Vec<ExportRow> {
    let names: HashMap<Uuid, &str> = users.iter().map(|u| (u.id, u.name.as_str())).collect();
    let name_of = |id: &Uuid| fit_cell(names.get(id).copied().unwrap_or(UNKNOWN_USER));

    tasks
        .iter()
        .enumerate()
        .map(|(index, task)| ExportRow {
            sequence: index + 1,
            title: fit_cell(&task.title),
            description: fit_cell(&task.description),
            status: task.status.label().to_string(),
            priority: task.priority.label().to_string(),
            creator: name_of(&task.creator_id),
            assignee: name_of(&task.assignee_id),
            created_at: zone.format_short(task.created_at),
            due_date: zone.format_short(task.due_date),
            completed_at: task
                .completed_at
                .map(|done| zone.format_short(done))
                .unwrap_or_default(),
            verdict: verdict(task, now).to_string(),
        })
        .collect()
}

/// Serializes rows to an `.xlsx` file in memory
pub fn write_xlsx(rows: &[ExportRow]) -> Result<Vec<u8>, ExportError> {
    if rows.is_empty() {
        return Err(ExportError::NoData);
    }

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, (title, width)) in COLUMNS.iter().enumerate() {
        let col = col as u16;
        sheet.set_column_width(col, *width)?;
        sheet.write_string_with_format(0, col, *title, &header)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let line = index as u32 + 1;
        sheet.write_number(line, 0, row.sequence as f64)?;
        for (col, cell) in row.cells().iter().enumerate().skip(1) {
            sheet.write_string(line, col as u16, cell)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// `Bao_Cao_Cong_Viec_{YYYY-MM-DD}.xlsx`
pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("Bao_Cao_Cong_Viec_{}.xlsx", now.format("%Y-%m-%d"))
}

/// Builds the rows and the workbook in one step
pub fn export_tasks(
    tasks: &[Task],
    users: &[User],
    zone: &ReportZone,
    now: DateTime<Utc>,
) -> Result<Vec<u8>, ExportError> {
    write_xlsx(&build_rows(tasks, users, zone, now))
}
