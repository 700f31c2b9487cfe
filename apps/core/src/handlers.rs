//! One handler per intent.
//!
//! Handlers return `Err` only for store or service failures; "no data" and
//! "could not parse" outcomes are ordinary answers. The orchestrator turns
//! errors into an apologetic message via [`failure_message`].

use crate::actors::messages::AppError;
use crate::actors::traits::{LlmActor, RagActor, Sampling};
use crate::analytics::cohort::{classify_cohort, render_cohort, PersonWindow, StabilityQuery};
use crate::analytics::condition::{compile_average_condition, rank_by_average, render_ranking, ConditionQuery};
use crate::analytics::summary::PersonSummary;
use crate::analytics::window::DateRange;
use crate::brain::context_packet::ContextPacket;
use crate::brain::intent::Intent;
use crate::brain::korean::{subject_particle, with_topic};
use crate::brain::slots::{detect_unknown_metric_keyword, Metric};
use crate::database;
use crate::models::{AskResponse, ChartSeries, ConditionRow, Reading, Turn};
use crate::prompts::{
    condition_prompt, extract_response, rag_prompt, report_prompt, stress_reason_prompt, CONDITION_MAX_TOKENS,
    RAG_MAX_TOKENS, REPORT_MAX_TOKENS, STRESS_REASON_MAX_TOKENS,
};
use sqlx::sqlite::SqlitePool;
use tracing::{debug, info};

pub const EMPTY_QUESTION: &str = "질문이 비어 있습니다.";
pub const NO_RESULTS: &str = "조건에 맞는 결과가 없습니다.";
pub const CONDITION_FORMAT_HINT: &str =
    "조건을 해석할 수 없습니다. 예: 'stress가 90 이상인 사람', 'ppg 평균이 1.0보다 큰 사람'";
pub const CHITCHAT_REPLY: &str =
    "안녕하세요! 건강 데이터에 대해 물어보세요. 예: '김민지의 스트레스 평균 알려줘', '최근 7일 불안정한 사람은?'";
pub const CLARIFICATION: &str = "질문을 이해하지 못했습니다. 이렇게 물어보세요:\n\
     - '김민지의 스트레스 평균 알려줘'\n\
     - '김민지 hrv 그래프 보여줘'\n\
     - 'stress가 90 이상인 사람'\n\
     - '최근 7일 안정적인 사람은 누구야'\n\
     - 'hrv가 낮으면 어떤 의미야?'";

/// Everything a handler may touch for one question.
pub struct HandlerContext<'a, L: LlmActor, R: RagActor> {
    pub pool: &'a SqlitePool,
    pub llm: &'a L,
    pub rag: &'a R,
    pub names: &'a [String],
    pub history: &'a [Turn],
    pub rag_top_k: usize,
}

/// Validation message when `report`/`visual` has no resolvable person.
pub fn missing_target_message(names: &[String]) -> String {
    if names.is_empty() {
        return "등록된 사용자 데이터가 없습니다.".to_string();
    }
    format!(
        "대상 사용자를 찾을 수 없습니다. 질문에 이름을 포함해 주세요. (등록된 사용자: {})",
        names.join(", ")
    )
}

pub fn name_only_reply(name: &str) -> String {
    format!(
        "{}님의 어떤 정보를 알려드릴까요? 예: '{}의 스트레스 평균', '{} hrv 그래프'",
        name, name, name
    )
}

/// Apologetic message carrying the underlying cause.
pub fn failure_message(intent: Intent, err: &AppError) -> String {
    let action = match intent {
        Intent::Report => "데이터 분석",
        Intent::Visual => "그래프 생성",
        Intent::FilterCondition | Intent::FilterStability => "데이터 필터링",
        _ => "응답 생성",
    };
    format!("죄송합니다. {} 중 오류가 발생했습니다: {}", action, err)
}

fn target_of(packet: &ContextPacket) -> Result<&str, AppError> {
    packet
        .target
        .as_deref()
        .ok_or_else(|| AppError::Validation("target person is required".to_string()))
}

/// Answer text from a completion, or `fallback` when the model wrote nothing usable.
fn answer_or(completion: &str, fallback: impl FnOnce() -> String) -> String {
    let answer = extract_response(completion);
    if answer.is_empty() {
        fallback()
    } else {
        answer
    }
}

pub async fn handle_report<L: LlmActor, R: RagActor>(
    ctx: &HandlerContext<'_, L, R>,
    packet: &ContextPacket,
) -> Result<AskResponse, AppError> {
    let target = target_of(packet)?;
    let readings = database::fetch_readings(ctx.pool, Some(target), packet.window.range()).await?;

    let Some(summary) = PersonSummary::from_readings(target, &readings) else {
        return Ok(AskResponse::text(
            Intent::Report,
            format!("{}의 {} 데이터가 존재하지 않습니다.", target, packet.window.label()),
        ));
    };
    let context = summary.render();
    debug!("Report context for {}:\n{}", target, context);

    let completion = ctx
        .llm
        .complete(report_prompt(&packet.normalized, &context), REPORT_MAX_TOKENS, Sampling::Deterministic)
        .await?;

    Ok(AskResponse::text(Intent::Report, answer_or(&completion, || context)))
}

/// Per-day values of `metric`, skipping days without a value.
pub fn chart_series(name: &str, metric: Metric, readings: &[Reading]) -> ChartSeries {
    let (dates, values) = readings
        .iter()
        .filter_map(|r| r.metric_value(metric).map(|v| (r.date, v)))
        .unzip();
    ChartSeries {
        name: name.to_string(),
        metric,
        dates,
        values,
    }
}

pub async fn handle_visual<L: LlmActor, R: RagActor>(
    ctx: &HandlerContext<'_, L, R>,
    packet: &ContextPacket,
) -> Result<AskResponse, AppError> {
    let target = target_of(packet)?;
    let readings = database::fetch_readings(ctx.pool, Some(target), packet.window.range()).await?;
    let series = chart_series(target, packet.metric, &readings);

    if series.values.is_empty() {
        return Ok(AskResponse::text(
            Intent::Visual,
            format!("{}의 {} 데이터가 존재하지 않습니다.", target, packet.metric.label_ko()),
        ));
    }

    Ok(AskResponse {
        intent: Intent::Visual,
        response: format!(
            "{}의 {} 추이 그래프 데이터를 생성했습니다. ({}일)",
            target,
            packet.metric.label_ko(),
            series.values.len()
        ),
        chart: Some(series),
    })
}

pub async fn handle_filter_condition<L: LlmActor, R: RagActor>(
    ctx: &HandlerContext<'_, L, R>,
    packet: &ContextPacket,
) -> Result<AskResponse, AppError> {
    if let Some(condition) = packet.condition {
        let query = ConditionQuery {
            condition,
            since: packet.since,
        };
        let rows = database::fetch_condition_rows(ctx.pool, &query).await?;
        info!("Condition query matched {} rows", rows.len());
        if rows.is_empty() {
            return Ok(AskResponse::text(Intent::FilterCondition, NO_RESULTS));
        }

        let completion = ctx
            .llm
            .complete(
                condition_prompt(&packet.normalized, &rows, ctx.history),
                CONDITION_MAX_TOKENS,
                Sampling::Deterministic,
            )
            .await?;
        let answer = answer_or(&completion, || matched_people_sentence(&rows));
        return Ok(AskResponse::text(Intent::FilterCondition, answer));
    }

    // Per-person average comparison.
    let Some(condition) = compile_average_condition(&packet.normalized) else {
        return Ok(AskResponse::text(Intent::FilterCondition, CONDITION_FORMAT_HINT));
    };
    let range = DateRange {
        from: packet.since,
        to: None,
    };
    let readings = database::fetch_readings(ctx.pool, None, range).await?;
    let ranked = rank_by_average(&readings, &condition);
    if ranked.is_empty() {
        return Ok(AskResponse::text(Intent::FilterCondition, NO_RESULTS));
    }
    Ok(AskResponse::text(Intent::FilterCondition, render_ranking(&ranked, &condition)))
}

/// "김민지, 이지훈이 조건을 만족했습니다." in first-match order.
fn matched_people_sentence(rows: &[ConditionRow]) -> String {
    let mut names: Vec<&str> = Vec::new();
    for row in rows {
        if !names.contains(&row.name.as_str()) {
            names.push(&row.name);
        }
    }
    match names.split_last() {
        Some((last, rest)) if rest.is_empty() => {
            format!("{}{} 조건을 만족했습니다.", last, subject_particle(last))
        }
        Some((last, rest)) => format!(
            "{}, {}{} 조건을 만족했습니다.",
            rest.join(", "),
            last,
            subject_particle(last)
        ),
        None => NO_RESULTS.to_string(),
    }
}

pub async fn handle_filter_stability<L: LlmActor, R: RagActor>(
    ctx: &HandlerContext<'_, L, R>,
    packet: &ContextPacket,
) -> Result<AskResponse, AppError> {
    let query = packet.stability.unwrap_or(StabilityQuery::Stable);
    let readings = database::fetch_readings(ctx.pool, None, packet.window.range()).await?;

    let people: Vec<PersonWindow> = ctx
        .names
        .iter()
        .map(|name| PersonWindow {
            name: name.clone(),
            readings: readings.iter().filter(|r| &r.name == name).cloned().collect(),
        })
        .collect();

    let matched = classify_cohort(&people, query);
    info!("Cohort ({:?}) over {}: {} of {}", query, packet.window.label(), matched.len(), people.len());

    Ok(AskResponse::text(
        Intent::FilterStability,
        render_cohort(&matched, query, &packet.window.label()),
    ))
}

pub async fn handle_semantic_qa<L: LlmActor, R: RagActor>(
    ctx: &HandlerContext<'_, L, R>,
    packet: &ContextPacket,
) -> Result<AskResponse, AppError> {
    let documents = ctx.rag.search(packet.normalized.clone(), ctx.rag_top_k).await?;
    debug!("Retrieved {} documents", documents.len());

    let completion = ctx
        .llm
        .complete(rag_prompt(&packet.normalized, &documents), RAG_MAX_TOKENS, Sampling::Stochastic)
        .await?;

    Ok(AskResponse::text(
        Intent::SemanticQa,
        answer_or(&completion, || "관련 정보를 찾지 못했습니다.".to_string()),
    ))
}

pub async fn handle_stress_reason<L: LlmActor, R: RagActor>(
    ctx: &HandlerContext<'_, L, R>,
    packet: &ContextPacket,
) -> Result<AskResponse, AppError> {
    let person_context = match packet.target.as_deref() {
        Some(target) => {
            let readings = database::fetch_readings(ctx.pool, Some(target), packet.window.range()).await?;
            PersonSummary::from_readings(target, &readings).map(|s| s.render())
        }
        None => None,
    };
    let documents = ctx.rag.search(packet.normalized.clone(), ctx.rag_top_k).await?;

    let completion = ctx
        .llm
        .complete(
            stress_reason_prompt(&packet.normalized, person_context.as_deref(), &documents),
            STRESS_REASON_MAX_TOKENS,
            Sampling::Stochastic,
        )
        .await?;

    let fallback = || match packet.target.as_deref() {
        Some(target) => format!("{} 스트레스 원인을 설명하지 못했습니다.", with_topic(target)),
        None => "스트레스 원인을 설명하지 못했습니다.".to_string(),
    };
    Ok(AskResponse::text(Intent::StressReason, answer_or(&completion, fallback)))
}

/// Routes a classified question to its handler.
pub async fn dispatch<L: LlmActor, R: RagActor>(
    ctx: &HandlerContext<'_, L, R>,
    packet: &ContextPacket,
) -> Result<AskResponse, AppError> {
    match packet.intent() {
        Intent::Report => handle_report(ctx, packet).await,
        Intent::Visual => handle_visual(ctx, packet).await,
        Intent::FilterCondition => handle_filter_condition(ctx, packet).await,
        Intent::FilterStability => handle_filter_stability(ctx, packet).await,
        Intent::SemanticQa => handle_semantic_qa(ctx, packet).await,
        Intent::StressReason => handle_stress_reason(ctx, packet).await,
        Intent::Chitchat => Ok(AskResponse::text(Intent::Chitchat, CHITCHAT_REPLY)),
        Intent::NameOnly => {
            let name = packet.target.as_deref().unwrap_or(packet.question.trim());
            Ok(AskResponse::text(Intent::NameOnly, name_only_reply(name)))
        }
        Intent::UnknownKeyword => Ok(AskResponse::text(
            Intent::UnknownKeyword,
            detect_unknown_metric_keyword(&packet.question).unwrap_or_else(|| CLARIFICATION.to_string()),
        )),
        Intent::Ambiguous => Ok(AskResponse::text(Intent::Ambiguous, CLARIFICATION)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::messages::ActorError;
    use chrono::NaiveDate;

    #[test]
    fn test_chart_series_skips_unparseable_days() {
        let readings = vec![
            Reading {
                id: 1,
                name: "김민지".to_string(),
                date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
                ppg_json: "[0.9, 1.1]".to_string(),
                hrv: 33.0,
                stress: 90.0,
            },
            Reading {
                id: 2,
                name: "김민지".to_string(),
                date: NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
                ppg_json: "oops".to_string(),
                hrv: 30.0,
                stress: 91.0,
            },
        ];

        let ppg = chart_series("김민지", Metric::Ppg, &readings);
        assert_eq!(ppg.dates, vec![NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()]);
        assert!((ppg.values[0] - 1.0).abs() < 1e-9);

        let hrv = chart_series("김민지", Metric::Hrv, &readings);
        assert_eq!(hrv.values, vec![33.0, 30.0]);
    }

    #[test]
    fn test_failure_message_carries_cause() {
        let err = AppError::Actor(ActorError::LlmError("connection refused".to_string()));
        let msg = failure_message(Intent::Report, &err);
        assert!(msg.starts_with("죄송합니다. 데이터 분석 중 오류가 발생했습니다"));
        assert!(msg.contains("connection refused"));
        assert!(failure_message(Intent::SemanticQa, &err).contains("응답 생성"));
    }

    #[test]
    fn test_missing_target_message() {
        assert!(missing_target_message(&[]).contains("없습니다"));
        let msg = missing_target_message(&["김민지".to_string(), "이지훈".to_string()]);
        assert!(msg.contains("김민지, 이지훈"));
    }

    #[test]
    fn test_matched_people_sentence() {
        let row = |name: &str, d: u32| ConditionRow {
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 4, d).unwrap(),
            value: 95.0,
        };
        assert_eq!(
            matched_people_sentence(&[row("김민지", 1), row("김민지", 2)]),
            "김민지가 조건을 만족했습니다."
        );
        assert_eq!(
            matched_people_sentence(&[row("김민지", 1), row("이지훈", 1)]),
            "김민지, 이지훈이 조건을 만족했습니다."
        );
    }

    #[test]
    fn test_answer_or() {
        assert_eq!(answer_or("Response: 좋아요", || "x".to_string()), "좋아요");
        assert_eq!(answer_or("Response:   ", || "대체".to_string()), "대체");
    }
}
