/// Integration tests for the BizTask API
///
/// These tests drive the full router over an in-memory store:
/// - Setup mode and authentication
/// - Task lifecycle and role permissions
/// - Company isolation
/// - Roster import, export and dictation

mod common;

use axum::http::StatusCode;
use common::TestContext;
use serde_json::json;

const COMPANY: &str = "Công ty ABC";

#[tokio::test]
async fn test_health_reports_connected_store() {
    let ctx = TestContext::new();
    let (status, body) = ctx.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "connected");
    assert!(body.get("pool").is_none());
}

#[tokio::test]
async fn test_unconfigured_server_requires_setup() {
    let app = TestContext::unconfigured();
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/v1/auth/login")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(
            json!({"companyName": COMPANY, "username": "a", "password": "b"}).to_string(),
        ))
        .unwrap();

    let (status, body) = common::send_to(&app, request).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "setup_required");
}

#[tokio::test]
async fn test_setup_changes_need_director_once_configured() {
    let ctx = TestContext::configured_postgres();
    let boss = ctx.register(COMPANY, "giamdoc").await;
    let lead = ctx.hire(&boss, COMPANY, "truongphong", "MANAGER").await;

    let (status, _) = ctx.send("DELETE", "/v1/setup", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx
        .send(
            "POST",
            "/v1/setup",
            None,
            Some(json!({"config": "{ databaseUrl: 'postgres://khac/db' }"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx.send("DELETE", "/v1/setup", Some(&lead.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .send(
            "POST",
            "/v1/setup",
            Some(&lead.token),
            Some(json!({"config": "{ databaseUrl: 'postgres://khac/db' }"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = ctx.send("GET", "/v1/setup", None, None).await;
    assert_eq!(body["configured"], true);

    let (status, _) = ctx.send("DELETE", "/v1/setup", Some(&boss.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = ctx.send("GET", "/v1/setup", None, None).await;
    assert_eq!(body["configured"], false);

    // Back in setup mode, pasting settings needs no token
    let (status, _) = ctx
        .send(
            "POST",
            "/v1/setup",
            None,
            Some(json!({"config": "không phải cấu hình"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_protected_routes_need_token() {
    let ctx = TestContext::new();

    let (status, _) = ctx.send("GET", "/v1/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx.send("GET", "/v1/tasks", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let ctx = TestContext::new();
    let boss = ctx.register(COMPANY, "giamdoc").await;
    assert_eq!(boss.user["role"], "DIRECTOR");
    assert!(boss.user.get("passwordHash").is_none());

    let (status, _) = ctx.login(COMPANY, "giamdoc", "sai-mat-khau").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Same login name, other company
    let (status, _) = ctx.login("Công ty XYZ", "giamdoc", "matkhau").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = ctx.send("GET", "/v1/profile", Some(&boss.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["companyName"], COMPANY);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let ctx = TestContext::new();
    ctx.register(COMPANY, "giamdoc").await;

    let (status, body) = ctx
        .send(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({
                "companyName": COMPANY,
                "name": "Người khác",
                "username": "giamdoc",
                "password": "khac",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn test_password_change_takes_effect() {
    let ctx = TestContext::new();
    let boss = ctx.register(COMPANY, "giamdoc").await;

    let (status, _) = ctx
        .send(
            "PUT",
            "/v1/profile/password",
            Some(&boss.token),
            Some(json!({"newPassword": "matkhaumoi"})),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = ctx.login(COMPANY, "giamdoc", "matkhau").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = ctx.login(COMPANY, "giamdoc", "matkhaumoi").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_task_lifecycle_through_api() {
    let ctx = TestContext::new();
    let boss = ctx.register(COMPANY, "giamdoc").await;
    let staff = ctx.hire(&boss, COMPANY, "nhanvien1", "EMPLOYEE").await;

    let task = ctx.create_task(&boss, "Gửi báo giá", &staff, 2).await;
    let id = task["id"].as_str().unwrap().to_string();
    assert_eq!(task["status"], "TODO");
    assert_eq!(task["assigneeId"], staff.user["id"]);

    let (status, list) = ctx.send("GET", "/v1/tasks", Some(&staff.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["deadline"]["urgency"], "SOON");

    let advance = format!("/v1/tasks/{}/advance", id);
    let (status, body) = ctx.send("POST", &advance, Some(&staff.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "STARTED");
    assert_eq!(body["task"]["status"], "IN_PROGRESS");

    let (_, body) = ctx.send("POST", &advance, Some(&staff.token), None).await;
    assert_eq!(body["outcome"], "NEEDS_COMPLETION");

    let (status, done) = ctx
        .send(
            "POST",
            &format!("/v1/tasks/{}/complete", id),
            Some(&staff.token),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["status"], "COMPLETED");
    assert!(done["completedAt"].is_string());

    let (status, body) = ctx.send("POST", &advance, Some(&staff.token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (_, completed) = ctx
        .send(
            "GET",
            "/v1/tasks?status=COMPLETED&completion=ON_TIME",
            Some(&boss.token),
            None,
        )
        .await;
    assert_eq!(completed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_completion_before_start_is_rejected() {
    let ctx = TestContext::new();
    let boss = ctx.register(COMPANY, "giamdoc").await;
    let staff = ctx.hire(&boss, COMPANY, "nhanvien1", "EMPLOYEE").await;
    let task = ctx.create_task(&boss, "Kiểm kho", &staff, 1).await;

    let (status, _) = ctx
        .send(
            "POST",
            &format!("/v1/tasks/{}/complete", task["id"].as_str().unwrap()),
            Some(&staff.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_employee_permissions() {
    let ctx = TestContext::new();
    let boss = ctx.register(COMPANY, "giamdoc").await;
    let staff = ctx.hire(&boss, COMPANY, "nhanvien1", "EMPLOYEE").await;
    let other = ctx.hire(&boss, COMPANY, "nhanvien2", "EMPLOYEE").await;

    // Employees are always assigned their own task
    let task = ctx.create_task(&staff, "Việc cá nhân", &boss, 3).await;
    assert_eq!(task["assigneeId"], staff.user["id"]);

    let (status, _) = ctx
        .send(
            "POST",
            "/v1/users",
            Some(&staff.token),
            Some(json!({"name": "X", "username": "x", "password": "123456"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.send("GET", "/v1/team", Some(&staff.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .send("GET", "/v1/team/leaderboard", Some(&staff.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    // Another employee cannot see or move this task
    let id = task["id"].as_str().unwrap();
    let (status, _) = ctx
        .send("GET", &format!("/v1/tasks/{}", id), Some(&other.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = ctx
        .send("POST", &format!("/v1/tasks/{}/advance", id), Some(&other.token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .send(
            "PUT",
            &format!("/v1/tasks/{}", id),
            Some(&staff.token),
            Some(json!({"title": "Đổi tên"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_companies_are_isolated() {
    let ctx = TestContext::new();
    let abc = ctx.register(COMPANY, "giamdoc").await;
    let xyz = ctx.register("Công ty XYZ", "giamdoc").await;
    let staff = ctx.hire(&abc, COMPANY, "nhanvien1", "EMPLOYEE").await;

    let task = ctx.create_task(&abc, "Nội bộ ABC", &staff, 1).await;
    let id = task["id"].as_str().unwrap();

    let (status, _) = ctx
        .send("GET", &format!("/v1/tasks/{}", id), Some(&xyz.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = ctx.send("GET", "/v1/tasks", Some(&xyz.token), None).await;
    assert!(list.as_array().unwrap().is_empty());

    let (_, users) = ctx.send("GET", "/v1/users", Some(&xyz.token), None).await;
    assert_eq!(users.as_array().unwrap().len(), 1);

    // Cannot hand work to another company's member
    let (status, _) = ctx
        .send(
            "POST",
            &format!("/v1/tasks/{}/reassign", id),
            Some(&abc.token),
            Some(json!({"assigneeId": xyz.id()})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reassign_open_and_completed_tasks() {
    let ctx = TestContext::new();
    let boss = ctx.register(COMPANY, "giamdoc").await;
    let a = ctx.hire(&boss, COMPANY, "nhanvien1", "EMPLOYEE").await;
    let b = ctx.hire(&boss, COMPANY, "nhanvien2", "EMPLOYEE").await;

    let task = ctx.create_task(&boss, "Giao hàng", &a, 1).await;
    let id = task["id"].as_str().unwrap().to_string();

    let (status, moved) = ctx
        .send(
            "POST",
            &format!("/v1/tasks/{}/reassign", id),
            Some(&boss.token),
            Some(json!({"assigneeId": b.id()})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["assigneeId"], b.user["id"]);
    assert_eq!(moved["status"], "TODO");

    ctx.send("POST", &format!("/v1/tasks/{}/advance", id), Some(&b.token), None)
        .await;
    ctx.send("POST", &format!("/v1/tasks/{}/complete", id), Some(&b.token), None)
        .await;

    let (status, _) = ctx
        .send(
            "POST",
            &format!("/v1/tasks/{}/reassign", id),
            Some(&boss.token),
            Some(json!({"assigneeId": a.id()})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // An edit cannot move it either
    let (status, _) = ctx
        .send(
            "PUT",
            &format!("/v1/tasks/{}", id),
            Some(&boss.token),
            Some(json!({"assigneeId": a.id()})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = ctx
        .send("GET", &format!("/v1/tasks/{}", id), Some(&boss.token), None)
        .await;
    assert_eq!(body["assigneeId"], b.user["id"]);
}

#[tokio::test]
async fn test_failed_images_need_explicit_consent() {
    let ctx = TestContext::new();
    let boss = ctx.register(COMPANY, "giamdoc").await;
    let due = chrono::Utc::now() + chrono::Duration::days(1);

    let draft = |proceed: bool| {
        json!({
            "title": "Chụp hiện trường",
            "dueDate": due,
            "attachments": ["data:image/png;base64,bm90LWFuLWltYWdl"],
            "proceedWithoutFailedImages": proceed,
        })
    };

    let (status, body) = ctx
        .send("POST", "/v1/tasks", Some(&boss.token), Some(draft(false)))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "media_error");
    assert_eq!(body["details"][0]["field"], "attachments[0]");

    let (status, body) = ctx
        .send("POST", "/v1/tasks", Some(&boss.token), Some(draft(true)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["warnings"].as_array().unwrap().len(), 1);
    assert!(body["task"]["attachments"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_title_is_bad_request() {
    let ctx = TestContext::new();
    let boss = ctx.register(COMPANY, "giamdoc").await;

    let (status, _) = ctx
        .send(
            "POST",
            "/v1/tasks",
            Some(&boss.token),
            Some(json!({"title": "  ", "dueDate": chrono::Utc::now()})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_roster_import_and_template() {
    let ctx = TestContext::new();
    let boss = ctx.register(COMPANY, "giamdoc").await;

    let csv = "Ho_Ten,Ten_Dang_Nhap,Mat_Khau,Chuc_Vu(MANAGER/EMPLOYEE)\n\
               Nguyen Van A,nhanvien1,123456,EMPLOYEE\n\
               Tran Van B,quanly1,123456,quanly\n\
               Trung Lap,giamdoc,123456,EMPLOYEE\n";

    let (status, report) = ctx.send_text("/v1/users/import", &boss.token, csv).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["imported"].as_array().unwrap().len(), 2);
    assert_eq!(report["imported"][1]["role"], "MANAGER");
    assert_eq!(report["skipped"][0]["reason"]["kind"], "DUPLICATE_USERNAME");

    let (status, _) = ctx.login(COMPANY, "quanly1", "123456").await;
    assert_eq!(status, StatusCode::OK);

    let (status, content_type, bytes) = ctx.download("/v1/users/template", &boss.token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.starts_with("text/csv"));
    assert!(String::from_utf8(bytes).unwrap().starts_with("Ho_Ten,"));
}

#[tokio::test]
async fn test_export_requires_data() {
    let ctx = TestContext::new();
    let boss = ctx.register(COMPANY, "giamdoc").await;

    let (status, _, _) = ctx.download("/v1/tasks/export", &boss.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let staff = ctx.hire(&boss, COMPANY, "nhanvien1", "EMPLOYEE").await;
    ctx.create_task(&boss, "Báo cáo tháng", &staff, 5).await;

    let (status, content_type, bytes) = ctx.download("/v1/tasks/export", &boss.token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.contains("spreadsheetml"));
    assert!(bytes.starts_with(b"PK"));
}

#[tokio::test]
async fn test_dashboard_and_team_figures() {
    let ctx = TestContext::new();
    let boss = ctx.register(COMPANY, "giamdoc").await;
    let staff = ctx.hire(&boss, COMPANY, "nhanvien1", "EMPLOYEE").await;

    ctx.create_task(&boss, "Quá hạn", &staff, -2).await;
    ctx.create_task(&boss, "Sắp tới hạn", &staff, 2).await;
    ctx.create_task(&boss, "Còn lâu", &staff, 20).await;

    let (status, body) = ctx.send("GET", "/v1/dashboard", Some(&staff.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["pending"], 3);
    assert_eq!(body["stats"]["overdueTotal"], 1);
    assert_eq!(body["stats"]["dueSoonTotal"], 1);
    assert_eq!(body["stats"]["urgentTotal"], 2);
    assert_eq!(body["pendingBadge"], 3);
    assert_eq!(body["trend"].as_array().unwrap().len(), 12);

    let (_, body) = ctx.send("GET", "/v1/dashboard", Some(&boss.token), None).await;
    assert_eq!(body["pendingBadge"], 0);
    assert_eq!(body["companyCreatedMonth"], 3);

    let (status, team) = ctx.send("GET", "/v1/team", Some(&boss.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(team[0]["user"]["username"], "nhanvien1");
    assert_eq!(team[0]["backlog"], 3);
    assert_eq!(team[0]["overdue"], 1);

    let (status, tasks) = ctx
        .send(
            "GET",
            &format!("/v1/team/{}/tasks", staff.id()),
            Some(&staff.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tasks[0]["title"], "Quá hạn");
}

#[tokio::test]
async fn test_dictation_fills_empty_title() {
    let ctx = TestContext::new();
    let boss = ctx.register(COMPANY, "giamdoc").await;

    let (status, body) = ctx
        .send(
            "POST",
            "/v1/dictation",
            Some(&boss.token),
            Some(json!({"audioBase64": "AAAA", "mimeType": "audio/webm"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Gửi báo giá cho khách");
    assert_eq!(body["description"], "");

    let (_, body) = ctx
        .send(
            "POST",
            "/v1/dictation",
            Some(&boss.token),
            Some(json!({
                "audioBase64": "AAAA",
                "mimeType": "audio/webm",
                "title": "Khách hàng",
            })),
        )
        .await;
    assert_eq!(body["title"], "Khách hàng");
    assert_eq!(body["description"], "Gửi báo giá cho khách");

    let (status, body) = ctx
        .send(
            "POST",
            "/v1/dictation",
            Some(&boss.token),
            Some(json!({"audioBase64": "", "mimeType": "audio/webm"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "media_error");
}

#[tokio::test]
async fn test_deleted_user_token_is_rejected() {
    let ctx = TestContext::new();
    let boss = ctx.register(COMPANY, "giamdoc").await;
    let staff = ctx.hire(&boss, COMPANY, "nhanvien1", "EMPLOYEE").await;

    let (status, _) = ctx
        .send("DELETE", &format!("/v1/users/{}", boss.id()), Some(&boss.token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = ctx
        .send("DELETE", &format!("/v1/users/{}", staff.id()), Some(&boss.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = ctx.send("GET", "/v1/profile", Some(&staff.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
