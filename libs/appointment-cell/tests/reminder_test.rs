use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::services::reminders::ReminderScanService;
use notification_cell::services::notify::NotificationService;
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockTableRows, TestConfig};

fn service_for(mock_server: &MockServer) -> ReminderScanService {
    let config = TestConfig {
        supabase_url: mock_server.uri(),
        ..Default::default()
    }
    .to_app_config();

    let supabase = Arc::new(SupabaseClient::new(&config));
    let notifications = Arc::new(NotificationService::with_client(Arc::clone(&supabase)));
    ReminderScanService::with_parts(supabase, notifications)
}

async fn mount_due_appointment(mock_server: &MockServer, appointment_id: &str, patient_id: &str, doctor_id: &str) {
    // Whatever window the scanner computes, one Scheduled appointment is
    // inside it for each lead.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "eq.scheduled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockTableRows::appointment(
                appointment_id,
                patient_id,
                doctor_id,
                "2025-06-01",
                "09:00:00",
                "scheduled",
            )
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockTableRows::profile(patient_id, "patient@example.com", "Test Patient", "patient")
        ])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn test_scan_queues_one_reminder_per_lead() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();

    mount_due_appointment(&mock_server, &appointment_id, &patient_id, &doctor_id).await;

    // No reminder inside either lookback window yet.
    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("notification_type", "eq.reminder"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    // One enqueue for the 24h lead, one for the 1h lead.
    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockTableRows::notification(
                &Uuid::new_v4().to_string(),
                &patient_id,
                "reminder",
                "pending",
                Some(appointment_id.as_str()),
            )
        ])))
        .expect(2)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let queued = service.scan("test-token").await.expect("scan should succeed");

    assert_eq!(queued, 2);
}

#[tokio::test]
async fn test_scan_within_dedup_window_queues_nothing() {
    let mock_server = MockServer::start().await;
    let appointment_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();

    mount_due_appointment(&mock_server, &appointment_id, &patient_id, &doctor_id).await;

    // A previous tick already queued reminders inside the lookback.
    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("notification_type", "eq.reminder"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockTableRows::notification(
                &Uuid::new_v4().to_string(),
                &patient_id,
                "reminder",
                "pending",
                Some(appointment_id.as_str()),
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let queued = service.scan("test-token").await.expect("scan should succeed");

    assert_eq!(queued, 0);
}

#[tokio::test]
async fn test_scan_with_no_due_appointments_is_quiet() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let queued = service.scan("test-token").await.expect("scan should succeed");

    assert_eq!(queued, 0);
}
