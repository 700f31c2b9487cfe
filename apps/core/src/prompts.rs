//! Prompt templates for the completion service.
//!
//! Every template ends with the `Response:` marker; [`extract_response`]
//! keeps only what the model wrote after the last marker.

use crate::models::{ConditionRow, Turn};

pub const RESPONSE_MARKER: &str = "Response:";

pub const REPORT_MAX_TOKENS: u32 = 100;
pub const CONDITION_MAX_TOKENS: u32 = 300;
pub const RAG_MAX_TOKENS: u32 = 200;
pub const STRESS_REASON_MAX_TOKENS: u32 = 200;
pub const INTENT_MAX_TOKENS: u32 = 16;

/// Text after the last `Response:` marker, or the whole completion trimmed.
pub fn extract_response(completion: &str) -> String {
    completion
        .rsplit(RESPONSE_MARKER)
        .next()
        .unwrap_or(completion)
        .trim()
        .to_string()
}

/// `role: content` lines for the given turns.
pub fn render_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn report_prompt(question: &str, summary_context: &str) -> String {
    format!(
        "당신은 사용자 건강 데이터를 간결하게 요약하는 시스템입니다.\n\n\
         아래는 요청된 사용자의 건강 지표 요약입니다:\n\n{summary_context}\n\n\
         요약 예시:\n\
         - Response: 김유진의 HRV는 평균 25로 낮고, 스트레스는 95로 높은 편입니다.\n\
         - Response: 박민수는 PPG 변동성이 낮고, 스트레스 평균이 90 이상으로 안정적이지 않습니다.\n\n\
         질문: {question}\n\n\
         위 내용을 참고해 자연스럽고 간결한 한국어 문장으로 요약하세요.\n\
         부가 설명 없이 반드시 'Response:'로 시작하고, 구체적 수치는 문장 안에 녹여 쓰세요.\n\
         {RESPONSE_MARKER} "
    )
}

pub fn condition_prompt(question: &str, rows: &[ConditionRow], history: &[Turn]) -> String {
    let summary = rows
        .iter()
        .map(|row| format!("{}, {}, {}", row.name, row.date, row.value))
        .collect::<Vec<_>>()
        .join("\n");
    let history = render_history(history);

    format!(
        "당신은 사용자 건강 조건을 판단하여 요약해주는 응답 시스템입니다.\n\n\
         아래는 직전 대화 내용입니다:\n{history}\n\n\
         사용자의 질문:\n{question}\n\n\
         조건을 만족하는 데이터 (이름, 날짜, 수치):\n{summary}\n\n\
         예시 응답:\n\
         - Response: 김민지가 5월 3일, 5월 6일에 조건을 만족했습니다.\n\
         - Response: 박지훈은 6월 2일과 6월 5일에 스트레스 수치 95 이상을 보였습니다.\n\n\
         조건을 만족하는 사람과 날짜만 자연스럽게 요약하세요. 수치는 언급하지 마세요.\n\
         반드시 'Response:'로 시작하는 한 문장으로만 답하세요.\n\
         {RESPONSE_MARKER} "
    )
}

pub fn rag_prompt(question: &str, documents: &[String]) -> String {
    let context = documents.join("\n");
    format!(
        "당신은 사용자 질문에 대해 배경 정보를 참고해 응답하는 시스템입니다.\n\n\
         배경 문서:\n{context}\n\n\
         질문:\n{question}\n\n\
         요약 예시:\n\
         - Response: PPG는 광용적맥파를 의미하며, 스트레스 지수와 관련 있습니다.\n\
         - Response: HRV는 자율신경계의 균형을 판단하는 주요 지표입니다.\n\n\
         배경 문서를 참고하여 자연스럽고 간결한 한국어로 한 문장으로 요약하세요.\n\
         반드시 'Response:'로 시작하세요.\n\
         {RESPONSE_MARKER} "
    )
}

pub fn stress_reason_prompt(question: &str, person_context: Option<&str>, documents: &[String]) -> String {
    let person = person_context.unwrap_or("(특정 사용자 데이터 없음)");
    let context = documents.join("\n");
    format!(
        "당신은 스트레스 수치의 원인을 설명하는 건강 상담 시스템입니다.\n\n\
         사용자 데이터 요약:\n{person}\n\n\
         참고 문서:\n{context}\n\n\
         질문:\n{question}\n\n\
         HRV와 PPG 수치를 근거로 스트레스가 높거나 낮은 이유를 두 문장 이내의 한국어로 설명하세요.\n\
         진단이나 처방은 하지 마세요. 반드시 'Response:'로 시작하세요.\n\
         {RESPONSE_MARKER} "
    )
}

pub fn intent_prompt(question: &str) -> String {
    format!(
        "다음 질문의 의도를 아래 라벨 중 하나로 분류하세요.\n\n\
         - report: 특정 사용자의 평균, 최대, 최소 등 통계 요약\n\
         - visual: 특정 사용자의 수치 변화 그래프\n\
         - filter_condition: 수치 조건이나 안정/불안정 상태를 만족하는 사람 찾기\n\
         - semantic_qa: 지표의 의미, 기준, 정상 범위에 대한 질문\n\
         - stress_reason: 스트레스가 높거나 낮은 이유\n\
         - chitchat: 인사나 잡담\n\n\
         질문: {question}\n\n\
         설명 없이 'Intent: <라벨>' 형식으로 한 줄만 답하세요.\n\
         Intent:"
    )
}
