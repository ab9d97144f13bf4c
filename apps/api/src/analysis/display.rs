//! Derived display rules: pure functions of an `AnalysisRecord` that the
//! report view, history cards and Markdown export all share.

use serde::Serialize;

use crate::analysis::record::{placeholders, AnalysisRecord, DealStructure, FinalVerdict, Sentiment};

/// 0–10 score to a 0–100 progress value.
pub fn investment_percentage(score: f64) -> f64 {
    score * 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictTier {
    Excellent,
    Promising,
    Moderate,
    HighRisk,
}

impl VerdictTier {
    /// ≥8 excellent, ≥5 promising, ≥1 moderate, anything lower (or NaN) high-risk.
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            VerdictTier::Excellent
        } else if score >= 5.0 {
            VerdictTier::Promising
        } else if score >= 1.0 {
            VerdictTier::Moderate
        } else {
            VerdictTier::HighRisk
        }
    }

    pub fn narrative(&self, company_name: &str, industry_type: &str) -> String {
        let industry = industry_type.to_lowercase();
        match self {
            VerdictTier::Excellent => format!(
                "{company_name} presents an excellent investment opportunity with a strong position \
                 in the {industry} sector. The company demonstrates exceptional market potential, \
                 innovative solutions, and a clear competitive advantage, making it a highly \
                 attractive investment prospect."
            ),
            VerdictTier::Promising => format!(
                "{company_name} shows promising investment potential in the {industry} sector. \
                 While there are some areas for improvement, the company's market position and \
                 growth trajectory indicate good potential for returns."
            ),
            VerdictTier::Moderate => format!(
                "{company_name} presents a moderate investment opportunity in the {industry} sector. \
                 The company shows some potential but faces significant challenges that need to be \
                 addressed for better investment prospects."
            ),
            VerdictTier::HighRisk => format!(
                "{company_name} currently presents a high-risk investment opportunity in the \
                 {industry} sector. The company faces substantial challenges and requires \
                 significant improvements before being considered a viable investment option."
            ),
        }
    }
}

/// The verdict paragraph for a record.
pub fn verdict_narrative(record: &AnalysisRecord) -> String {
    VerdictTier::from_score(record.investment_score).narrative(
        &record.company_overview.company_name,
        &record.industry_type,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    High,
    Moderate,
    Low,
}

impl RiskLevel {
    pub fn from_factor(risk_factor: f64) -> Self {
        if risk_factor >= 7.0 {
            RiskLevel::High
        } else if risk_factor >= 4.0 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "high",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Low => "low",
        }
    }
}

/// A 10-point score drawn as five stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StarRating {
    pub full: u8,
    pub half: u8,
    pub empty: u8,
}

impl StarRating {
    const TOTAL: u8 = 5;

    pub fn from_score(score: f64) -> Self {
        let score = if score.is_finite() {
            score.clamp(0.0, 10.0)
        } else {
            0.0
        };
        let full = (score / 2.0).floor() as u8;
        let half = u8::from(score % 2.0 >= 1.0 && full < Self::TOTAL);
        StarRating {
            full,
            half,
            empty: Self::TOTAL - full - half,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentColor {
    Green,
    Red,
    Yellow,
}

impl SentimentColor {
    pub fn for_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "positive" => SentimentColor::Green,
            "negative" => SentimentColor::Red,
            _ => SentimentColor::Yellow,
        }
    }

    pub fn for_sentiment(sentiment: Sentiment) -> Self {
        Self::for_label(sentiment.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadarPoint {
    pub subject: &'static str,
    pub value: f64,
}

/// Radar-chart axes. Financial health, customer traction and team strength
/// have no verdict field of their own and reuse the closest one.
pub fn radar_points(verdict: &FinalVerdict) -> Vec<RadarPoint> {
    [
        ("Product Viability", verdict.product_viability),
        ("Financial Health", verdict.product_viability),
        ("Market Potential", verdict.market_potential),
        ("Sustainability", verdict.sustainability),
        ("Innovation", verdict.innovation),
        ("Exit Potential", verdict.exit_potential),
        ("Risk Factors", verdict.risk_factor),
        ("Customer Traction", verdict.market_potential),
        ("Competitive Edge", verdict.competitive_edge),
        ("Team Strength", verdict.innovation),
    ]
    .into_iter()
    .map(|(subject, value)| RadarPoint { subject, value })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealTerm {
    pub label: &'static str,
    pub value: String,
    pub disclosed: bool,
}

/// One row per deal term. Undisclosed terms carry their placeholder sentence.
pub fn deal_terms(deal: &DealStructure) -> Vec<DealTerm> {
    const ROWS: [(&str, &str); 7] = [
        ("Investment Amount", placeholders::INVESTMENT_AMOUNT),
        ("Equity Stake", placeholders::EQUITY_STAKE),
        ("Valuation Cap", placeholders::VALUATION_CAP),
        ("Liquidation Preference", placeholders::LIQUIDATION_PREFERENCE),
        ("Anti-Dilution Protection", placeholders::ANTI_DILUTION),
        ("Board Seat", placeholders::BOARD_SEAT),
        ("Vesting Schedule", placeholders::VESTING_SCHEDULE),
    ];

    let values: [Option<String>; 7] = match deal {
        DealStructure::Disclosed(t) => [
            Some(t.investment_amount.clone()),
            Some(t.equity_stake.clone()),
            Some(t.valuation_cap.clone()),
            Some(t.liquidation_preference.clone()),
            Some(t.anti_dilution_protection.to_string()),
            Some(t.board_seat.to_string()),
            Some(t.vesting_schedule.clone()),
        ],
        DealStructure::Undisclosed { .. } => Default::default(),
    };

    ROWS.iter()
        .zip(values)
        .map(|(&(label, placeholder), value)| match value {
            Some(value) if value != placeholder => DealTerm {
                label,
                value,
                disclosed: true,
            },
            _ => DealTerm {
                label,
                value: placeholder.to_string(),
                disclosed: false,
            },
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationStars {
    pub news_media: StarRating,
    pub social_media: StarRating,
    pub investor_reviews: StarRating,
    pub customer_feedback: StarRating,
    pub overall: StarRating,
}

/// Everything the report screen derives from a record, computed once.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub investment_percentage: f64,
    pub verdict_tier: VerdictTier,
    pub verdict: String,
    pub risk_level: RiskLevel,
    pub sentiment_color: SentimentColor,
    pub strengths_detected: usize,
    pub issues_detected: usize,
    pub reputation_stars: ReputationStars,
    pub radar: Vec<RadarPoint>,
    pub deal_message: Option<String>,
    pub deal_terms: Vec<DealTerm>,
}

impl ReportView {
    pub fn from_record(record: &AnalysisRecord) -> Self {
        let reputation = &record.expert_insights.reputation;
        ReportView {
            investment_percentage: investment_percentage(record.investment_score),
            verdict_tier: VerdictTier::from_score(record.investment_score),
            verdict: verdict_narrative(record),
            risk_level: RiskLevel::from_factor(record.final_verdict.risk_factor),
            sentiment_color: SentimentColor::for_sentiment(reputation.sentiment),
            strengths_detected: record.strengths.len(),
            issues_detected: record.weaknesses.len(),
            reputation_stars: ReputationStars {
                news_media: StarRating::from_score(reputation.news_media),
                social_media: StarRating::from_score(reputation.social_media),
                investor_reviews: StarRating::from_score(reputation.investor_reviews),
                customer_feedback: StarRating::from_score(reputation.customer_feedback),
                overall: StarRating::from_score(reputation.overall),
            },
            radar: radar_points(&record.final_verdict),
            deal_message: match &record.proposed_deal_structure {
                DealStructure::Undisclosed { message } => Some(message.clone()),
                DealStructure::Disclosed(_) => None,
            },
            deal_terms: deal_terms(&record.proposed_deal_structure),
        }
    }
}
