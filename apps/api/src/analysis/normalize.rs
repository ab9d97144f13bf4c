//! Response Normalizer: maps the model's loosely-typed JSON onto `AnalysisRecord`.
//!
//! Total over every input: any JSON value (including non-objects) produces a
//! fully-populated record. Missing, null, or mistyped fields fall back to their
//! documented defaults instead of failing.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::analysis::record::{
    placeholders, AnalysisRecord, CompanyOverview, Competitor, DealStructure, DealTerms,
    ExpertInsights, ExpertOpinion, FinalVerdict, FundingHistory, FundingRound, InsightOpinion,
    KeyQuestions, MarketAnalysis, MarketComparison, MarketPosition, Metrics, QuestionAnswer,
    Reputation, Sentiment, NOT_AVAILABLE,
};

const UNKNOWN: &str = "Unknown";
const NOT_SPECIFIED: &str = "Not specified";
const MAX_SCORE: f64 = 10.0;

/// Normalizes a raw model response, stamping it with the current time.
pub fn normalize(raw: &Value) -> AnalysisRecord {
    normalize_at(raw, Utc::now())
}

/// Normalizes a raw model response with an explicit analysis timestamp.
pub fn normalize_at(raw: &Value, analyzed_at: DateTime<Utc>) -> AnalysisRecord {
    let profile = |field: &str| raw.get("profile").and_then(|p| p.get(field));
    let conclusion = |field: &str| raw.get("expertConclusion").and_then(|c| c.get(field));

    let company_name = text_or(profile("companyName"), NOT_AVAILABLE);
    let industry = text_or(profile("industry"), NOT_AVAILABLE);
    let position_text = text_or(profile("marketPosition"), NOT_AVAILABLE);
    let market_position = MarketPosition::from(position_text.clone());
    let key_offerings = text_list(profile("keyOfferings"));

    let strengths = text_list(raw.pointer("/strengthsWeaknesses/strengths"));
    let weaknesses = text_list(raw.pointer("/strengthsWeaknesses/weaknesses"));

    let metrics = raw.pointer("/marketComparison/metrics");
    let raw_competitors = items(raw.get("competitors"));

    let key_questions = KeyQuestions {
        market_strategy: QuestionAnswer {
            question: "What is the market strategy?".to_string(),
            answer: format!(
                "Based on the analysis, {company_name}'s market strategy focuses on {position_text} \
                 in the {industry} sector. The company leverages {} to capture market share.",
                text_or(profile("competitiveAdvantage"), NOT_AVAILABLE)
            ),
        },
        user_retention: QuestionAnswer {
            question: "How is user retention handled?".to_string(),
            answer: format!(
                "The company's user retention strategy is built around {}. \
                 This approach is supported by {}.",
                join_or_default(&key_offerings),
                text_or(profile("teamHighlights"), NOT_AVAILABLE)
            ),
        },
        regulatory_risks: QuestionAnswer {
            question: "What are the regulatory risks?".to_string(),
            answer: format!(
                "In the {industry} sector, key regulatory considerations include {}. \
                 The company addresses these through {}.",
                join_or_default(&weaknesses),
                text_or(profile("solution"), NOT_AVAILABLE)
            ),
        },
    };

    AnalysisRecord {
        industry_type: industry.clone(),
        pitch_clarity: score(raw.get("pitchClarity")),
        investment_score: parse_score(raw.get("investmentScore"))
            .or_else(|| parse_score(conclusion("productViability")))
            .unwrap_or(0.0),
        market_position: market_position.clone(),
        market_analysis: MarketAnalysis {
            market_size: text_or(profile("marketSize"), NOT_AVAILABLE),
            growth_rate: text_or(metric(metrics, "growthRate", "startup"), NOT_AVAILABLE),
        },
        company_overview: CompanyOverview {
            company_name,
            industry,
            business_model: text_or(profile("businessModel"), NOT_AVAILABLE),
            key_offerings,
            market_position,
            founded_on: text_or(profile("foundedOn"), NOT_AVAILABLE),
        },
        strengths,
        weaknesses,
        funding_history: FundingHistory {
            rounds: items(raw.get("fundingHistory"))
                .iter()
                .map(funding_round)
                .collect(),
        },
        competitors: raw_competitors.iter().map(competitor).collect(),
        market_comparison: MarketComparison {
            startup: metrics_for(metrics, "startup"),
            competitors: raw_competitors
                .iter()
                .enumerate()
                .map(|(i, c)| metrics_for(metrics, &competitor_key(c, i)))
                .collect(),
        },
        expert_opinions: items(raw.get("expertOpinions"))
            .iter()
            .map(expert_opinion)
            .collect(),
        expert_insights: expert_insights(raw.get("expertInsights")),
        final_verdict: FinalVerdict {
            product_viability: score(conclusion("productViability")),
            market_potential: score(conclusion("marketPotential")),
            sustainability: score(conclusion("sustainability")),
            innovation: score(conclusion("innovation")),
            exit_potential: score(conclusion("exitPotential")),
            risk_factor: score(conclusion("riskFactors")),
            competitive_edge: score(conclusion("competitiveAdvantage")),
        },
        proposed_deal_structure: deal_structure(raw.get("dealStructure")),
        key_questions,
        analyzed_at,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Section mappers
// ────────────────────────────────────────────────────────────────────────────

fn funding_round(round: &Value) -> FundingRound {
    FundingRound {
        round_type: text_or(round.get("round"), UNKNOWN),
        amount: text_or(round.get("amount"), NOT_SPECIFIED),
        key_investors: text_list(round.get("investors")),
    }
}

fn competitor(entry: &Value) -> Competitor {
    let field = |key: &str| text_or(entry.get(key), NOT_AVAILABLE);
    Competitor {
        // A bare string entry is taken as the competitor's name.
        name: text(entry.get("name"))
            .or_else(|| text(Some(entry)))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        key_investors: text_list(entry.get("keyInvestors")),
        amount_raised: field("amountRaised"),
        market_position: field("marketPosition"),
        strengths: field("strengths"),
        growth_rate: field("growthRate"),
        business_model: field("businessModel"),
        key_differentiator: field("keyDifferentiator"),
    }
}

/// The metrics key a competitor is joined on: its explicit `id`, or the
/// positional `competitor{n}` key when the model omitted one.
fn competitor_key(entry: &Value, index: usize) -> String {
    entry
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("competitor{}", index + 1))
}

fn metric<'a>(metrics: Option<&'a Value>, name: &str, key: &str) -> Option<&'a Value> {
    metrics.and_then(|m| m.get(name)).and_then(|m| m.get(key))
}

fn metrics_for(metrics: Option<&Value>, key: &str) -> Metrics {
    let read = |name: &str| text_or(metric(metrics, name, key), NOT_AVAILABLE);
    Metrics {
        market_share: read("marketShare"),
        growth_rate: read("growthRate"),
        revenue_model: read("revenueModel"),
        differentiator: read("differentiator"),
    }
}

fn expert_opinion(entry: &Value) -> ExpertOpinion {
    let field = |key: &str| text_or(entry.get(key), NOT_AVAILABLE);
    ExpertOpinion {
        name: field("name"),
        affiliation: field("affiliation"),
        summary: field("summary"),
        reference: field("reference"),
        date: field("date"),
    }
}

fn expert_insights(insights: Option<&Value>) -> ExpertInsights {
    let opinions = items(insights.and_then(|i| i.get("expertOpinions")))
        .iter()
        .map(|entry| {
            let field = |key: &str| text_or(entry.get(key), UNKNOWN);
            InsightOpinion {
                name: field("name"),
                title: field("title"),
                affiliation: field("affiliation"),
                analysis: field("analysis"),
                reference: field("reference"),
                date: field("date"),
            }
        })
        .collect();

    let reputation = insights.and_then(|i| i.get("reputationAnalysis"));
    let rating = |key: &str| score(reputation.and_then(|r| r.get(key)));

    ExpertInsights {
        opinions,
        reputation: Reputation {
            news_media: rating("newsMedia"),
            social_media: rating("socialMedia"),
            investor_reviews: rating("investorReviews"),
            customer_feedback: rating("customerFeedback"),
            overall: rating("overall"),
            sentiment: text(reputation.and_then(|r| r.get("sentiment")))
                .map(|s| Sentiment::parse(&s))
                .unwrap_or_default(),
        },
    }
}

fn deal_structure(deal: Option<&Value>) -> DealStructure {
    let Some(deal) = deal.and_then(Value::as_object) else {
        return DealStructure::undisclosed();
    };

    let term = |key: &str| disclosed_term(deal, key);
    let anti_dilution = flag(deal.get("antiDilution").or_else(|| deal.get("antiDilutionProtection")));
    let board_seat = flag(deal.get("boardSeat"));

    let terms = [
        (term("investmentAmount"), placeholders::INVESTMENT_AMOUNT),
        (term("equityStake"), placeholders::EQUITY_STAKE),
        (term("valuationCap"), placeholders::VALUATION_CAP),
        (term("liquidationPreference"), placeholders::LIQUIDATION_PREFERENCE),
        (term("vestingSchedule"), placeholders::VESTING_SCHEDULE),
    ];
    if terms.iter().all(|(t, _)| t.is_none()) && !anti_dilution && !board_seat {
        return DealStructure::undisclosed();
    }

    let [investment_amount, equity_stake, valuation_cap, liquidation_preference, vesting_schedule] =
        terms.map(|(t, placeholder)| t.unwrap_or_else(|| placeholder.to_string()));

    DealStructure::Disclosed(DealTerms {
        investment_amount,
        equity_stake,
        valuation_cap,
        liquidation_preference,
        anti_dilution_protection: anti_dilution.into(),
        board_seat: board_seat.into(),
        vesting_schedule,
    })
}

/// A deal term counts as disclosed unless it is blank or the model's own
/// "Not specified" filler.
fn disclosed_term(deal: &Map<String, Value>, key: &str) -> Option<String> {
    text(deal.get(key)).filter(|t| !t.eq_ignore_ascii_case(NOT_SPECIFIED))
}

// ────────────────────────────────────────────────────────────────────────────
// Lenient readers
// ────────────────────────────────────────────────────────────────────────────

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_or(value: Option<&Value>, default: &str) -> String {
    text(value).unwrap_or_else(|| default.to_string())
}

/// Arrays keep their textual items; a lone string becomes a one-item list.
fn text_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| text(Some(v))).collect(),
        Some(v @ Value::String(_)) => text(Some(v)).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn items(value: Option<&Value>) -> &[Value] {
    value
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Reads a 0–10 score from a number or a numeric string such as `"7"` or `"7.5/10"`.
fn parse_score(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.split('/').next()?.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then(|| n.clamp(0.0, MAX_SCORE))
}

fn score(value: Option<&Value>) -> f64 {
    parse_score(value).unwrap_or(0.0)
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "y"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

fn join_or_default(list: &[String]) -> String {
    if list.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        list.join(", ")
    }
}
