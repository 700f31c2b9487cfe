//! Integration Tests
//!
//! End-to-end question flows through the supervisor, backed by the seeded
//! in-memory store and recording mock actors.

use super::fixtures::{seeded_pool, spawn_supervisor, spawn_supervisor_on, MockLlm};
use crate::brain::Intent;
use crate::handlers::{CHITCHAT_REPLY, CLARIFICATION, EMPTY_QUESTION, NO_RESULTS};
use std::sync::Arc;

#[tokio::test]
async fn test_report_uses_only_target_data() {
    let llm = Arc::new(MockLlm::answering("Response: 김민지의 스트레스 평균은 94.857로 높은 편입니다."));
    let supervisor = spawn_supervisor(llm.clone()).await;

    let answer = supervisor
        .ask("김민지의 스트레스 평균 알려줘".to_string())
        .await
        .expect("ask failed");

    assert_eq!(answer.intent, Intent::Report);
    assert_eq!(answer.response, "김민지의 스트레스 평균은 94.857로 높은 편입니다.");

    let prompts = llm.recorded();
    assert_eq!(prompts.len(), 1, "rules matched, so no intent fallback call");
    assert!(prompts[0].contains("- 김민지 (7일):"));
    assert!(prompts[0].contains("스트레스: 평균 94.857"));
    assert!(!prompts[0].contains("이지훈"));
}

#[tokio::test]
async fn test_report_falls_back_to_summary_when_completion_is_empty() {
    let llm = Arc::new(MockLlm::answering("Response:"));
    let supervisor = spawn_supervisor(llm).await;

    let answer = supervisor.ask("이지훈 hrv 평균".to_string()).await.unwrap();
    assert_eq!(answer.intent, Intent::Report);
    assert!(answer.response.starts_with("- 이지훈 (2일):"));
    assert!(answer.response.contains("HRV: 평균 54.500"));
}

#[tokio::test]
async fn test_report_outside_window_has_no_data() {
    let llm = Arc::new(MockLlm::answering("Response: -"));
    let supervisor = spawn_supervisor(llm.clone()).await;

    let answer = supervisor.ask("이지훈 4월 5일 스트레스 평균".to_string()).await.unwrap();
    assert_eq!(answer.intent, Intent::Report);
    assert!(answer.response.contains("데이터가 존재하지 않습니다"));
    assert!(llm.recorded().is_empty());
}

#[tokio::test]
async fn test_condition_without_matches_is_neutral() {
    let llm = Arc::new(MockLlm::answering("Response: 없음"));
    let supervisor = spawn_supervisor(llm.clone()).await;

    let answer = supervisor.ask("스트레스 120 이상인 사람".to_string()).await.unwrap();

    assert_eq!(answer.intent, Intent::FilterCondition);
    assert_eq!(answer.response, NO_RESULTS);
    assert!(llm.recorded().is_empty());
}

#[tokio::test]
async fn test_condition_rows_reach_prompt() {
    let llm = Arc::new(MockLlm::answering("Response: 김민지가 4월 1일부터 7일까지 조건을 만족했습니다."));
    let supervisor = spawn_supervisor(llm.clone()).await;

    let answer = supervisor.ask("stress가 90 이상인 사람".to_string()).await.unwrap();

    assert_eq!(answer.intent, Intent::FilterCondition);
    assert_eq!(answer.response, "김민지가 4월 1일부터 7일까지 조건을 만족했습니다.");
    let prompt = &llm.recorded()[0];
    assert!(prompt.contains("김민지, 2025-04-01, 90"));
    assert!(prompt.contains("김민지, 2025-04-07, 99"));
    assert!(!prompt.contains("이지훈, "));
}

#[tokio::test]
async fn test_condition_average_fallback_ranks_people() {
    let llm = Arc::new(MockLlm::answering("Response: -"));
    let supervisor = spawn_supervisor(llm.clone()).await;

    let answer = supervisor.ask("hrv가 40보다 낮은 사람".to_string()).await.unwrap();

    assert_eq!(answer.intent, Intent::FilterCondition);
    assert!(answer.response.starts_with("평균 HRV 40"));
    assert!(answer.response.contains("1. 김민지 (25.000)"));
    assert!(!answer.response.contains("이지훈"));
    assert!(llm.recorded().is_empty());
}

#[tokio::test]
async fn test_unstable_cohort_over_recent_week() {
    let llm = Arc::new(MockLlm::answering("Response: -"));
    let supervisor = spawn_supervisor(llm.clone()).await;

    let answer = supervisor.ask("최근 7일 불안정한 사람 누구야".to_string()).await.unwrap();

    assert_eq!(answer.intent, Intent::FilterStability);
    assert_eq!(answer.response, "최근 7일 기준 김민지는 불안정한 상태입니다.");
    assert!(llm.recorded().is_empty());
}

#[tokio::test]
async fn test_stable_cohort_can_be_empty() {
    let llm = Arc::new(MockLlm::answering("Response: -"));
    let supervisor = spawn_supervisor(llm).await;

    // 이지훈 has healthy HRV and stress but a PPG mean far below the stable band.
    let answer = supervisor.ask("안정적인 사람 누구야".to_string()).await.unwrap();
    assert_eq!(answer.intent, Intent::FilterStability);
    assert_eq!(answer.response, "전체 기간 기준 안정적인 상태로 분류된 사람이 없습니다.");
}

#[tokio::test]
async fn test_visual_returns_series() {
    let llm = Arc::new(MockLlm::answering("Response: -"));
    let supervisor = spawn_supervisor(llm).await;

    let answer = supervisor.ask("김민지 hrv 그래프 보여줘".to_string()).await.unwrap();

    assert_eq!(answer.intent, Intent::Visual);
    let chart = answer.chart.expect("chart series");
    assert_eq!(chart.name, "김민지");
    assert_eq!(chart.values, vec![33.0, 30.0, 28.0, 25.0, 22.0, 20.0, 17.0]);
    assert_eq!(chart.dates.len(), 7);
}

#[tokio::test]
async fn test_missing_target_is_reported() {
    let llm = Arc::new(MockLlm::answering("Response: -"));
    let supervisor = spawn_supervisor(llm.clone()).await;

    let answer = supervisor.ask("스트레스 평균 알려줘".to_string()).await.unwrap();

    assert_eq!(answer.intent, Intent::Report);
    assert!(answer.response.contains("김민지, 이지훈"));
    assert!(llm.recorded().is_empty());
}

#[tokio::test]
async fn test_unknown_metric_short_circuits() {
    let llm = Arc::new(MockLlm::answering("Response: -"));
    let supervisor = spawn_supervisor(llm.clone()).await;

    let answer = supervisor.ask("김민지 심박수 평균 알려줘".to_string()).await.unwrap();

    assert_eq!(answer.intent, Intent::UnknownKeyword);
    assert!(answer.response.contains("'심박수'"));
    assert!(llm.recorded().is_empty());
}

#[tokio::test]
async fn test_chitchat_and_name_only() {
    let llm = Arc::new(MockLlm::answering("Response: -"));
    let supervisor = spawn_supervisor(llm.clone()).await;

    let hello = supervisor.ask("  안녕하세요 ".to_string()).await.unwrap();
    assert_eq!(hello.intent, Intent::Chitchat);
    assert_eq!(hello.response, CHITCHAT_REPLY);

    let name = supervisor.ask("이지훈".to_string()).await.unwrap();
    assert_eq!(name.intent, Intent::NameOnly);
    assert!(name.response.starts_with("이지훈님의 어떤 정보를"));

    assert!(llm.recorded().is_empty());
}

#[tokio::test]
async fn test_empty_question() {
    let llm = Arc::new(MockLlm::answering("Response: -"));
    let supervisor = spawn_supervisor(llm).await;

    let answer = supervisor.ask("   ".to_string()).await.unwrap();
    assert_eq!(answer.response, EMPTY_QUESTION);
}

#[tokio::test]
async fn test_ambiguous_uses_llm_fallback() {
    let llm = Arc::new(MockLlm::answering("Response: 수면과 스트레스 관리가 중요합니다.").with_intent("semantic_qa"));
    let supervisor = spawn_supervisor(llm.clone()).await;

    let answer = supervisor.ask("요즘 컨디션 괜찮을까".to_string()).await.unwrap();

    assert_eq!(answer.intent, Intent::SemanticQa);
    assert_eq!(answer.response, "수면과 스트레스 관리가 중요합니다.");
    let prompts = llm.recorded();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].trim_end().ends_with("Intent:"));
    assert!(prompts[1].contains("HRV는 심박 변이도로"));
    assert!(!prompts[1].contains("PPG는 광용적맥파 신호"), "top-k is 2");
}

#[tokio::test]
async fn test_ambiguous_after_fallback_asks_to_rephrase() {
    let llm = Arc::new(MockLlm::answering("Response: -"));
    let supervisor = spawn_supervisor(llm.clone()).await;

    let answer = supervisor.ask("요즘 컨디션 괜찮을까".to_string()).await.unwrap();

    assert_eq!(answer.intent, Intent::Ambiguous);
    assert_eq!(answer.response, CLARIFICATION);
    assert_eq!(llm.recorded().len(), 1);
}

#[tokio::test]
async fn test_stress_reason_combines_person_and_documents() {
    let llm = Arc::new(MockLlm::answering("Response: HRV가 계속 낮아져 스트레스가 높게 나타납니다."));
    let supervisor = spawn_supervisor(llm.clone()).await;

    let answer = supervisor.ask("김민지 스트레스가 왜 높아?".to_string()).await.unwrap();

    assert_eq!(answer.intent, Intent::StressReason);
    let prompt = &llm.recorded()[0];
    assert!(prompt.contains("- 김민지 (7일):"));
    assert!(prompt.contains("스트레스 지수는 HRV가 낮을 때"));
}

#[tokio::test]
async fn test_llm_failure_becomes_apology() {
    let llm = Arc::new(MockLlm::failing("connection refused"));
    let supervisor = spawn_supervisor(llm).await;

    let answer = supervisor.ask("김민지의 스트레스 평균 알려줘".to_string()).await.unwrap();

    assert_eq!(answer.intent, Intent::Report);
    assert!(answer.response.contains("데이터 분석 중 오류가 발생했습니다"));
    assert!(answer.response.contains("connection refused"));
}

#[tokio::test]
async fn test_history_feeds_condition_prompt_until_reset() {
    let llm = Arc::new(MockLlm::answering("Response: 확인했습니다."));
    let supervisor = spawn_supervisor(llm.clone()).await;

    supervisor.ask("김민지의 스트레스 평균 알려줘".to_string()).await.unwrap();
    supervisor.ask("stress가 95 이상인 사람".to_string()).await.unwrap();

    let prompts = llm.recorded();
    assert!(prompts[1].contains("user: 김민지의 스트레스 평균 알려줘"));
    assert!(prompts[1].contains("assistant: 확인했습니다."));

    supervisor.reset_history().await.unwrap();
    supervisor.ask("stress가 95 이상인 사람".to_string()).await.unwrap();

    let prompts = llm.recorded();
    assert!(!prompts[2].contains("user: 김민지의 스트레스 평균 알려줘"));
}

#[tokio::test]
async fn test_unreadable_store_becomes_apology() {
    let pool = seeded_pool().await;
    sqlx::query("DROP TABLE readings").execute(&pool).await.unwrap();
    let llm = Arc::new(MockLlm::answering("Response: -"));
    let supervisor = spawn_supervisor_on(pool, llm.clone());

    let answer = supervisor
        .ask("김민지의 스트레스 평균 알려줘".to_string())
        .await
        .expect("store failures are answered, not raised");

    assert_eq!(answer.intent, Intent::Ambiguous);
    assert!(answer.response.starts_with("죄송합니다. 응답 생성 중 오류가 발생했습니다"));
    assert!(answer.response.contains("no such table: readings"));
    assert!(answer.chart.is_none());
    assert!(llm.recorded().is_empty());
}
