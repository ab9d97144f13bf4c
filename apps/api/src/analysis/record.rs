//! The normalized analysis record, the one shape every downstream consumer
//! (history, display rules, report export) depends on.
//!
//! Every field is always present. Scores live in [0, 10], lists default to
//! empty, and strings default to `"N/A"` or a field-specific placeholder.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const NOT_AVAILABLE: &str = "N/A";

/// Placeholder sentences for undisclosed deal terms. Each term has its own
/// wording; the UI shows these verbatim.
pub mod placeholders {
    pub const NO_DEAL_STRUCTURE: &str =
        "No deal structure information was proposed or disclosed in the deck";
    pub const INVESTMENT_AMOUNT: &str =
        "The company has not disclosed their investment ask in the pitch deck";
    pub const EQUITY_STAKE: &str =
        "The company has not specified the equity stake they are offering";
    pub const VALUATION_CAP: &str = "The company has not provided their valuation expectations";
    pub const LIQUIDATION_PREFERENCE: &str =
        "Liquidation preference terms have not been specified in the deck";
    pub const ANTI_DILUTION: &str = "Anti-dilution protection terms have not been disclosed";
    pub const BOARD_SEAT: &str = "Board seat arrangements have not been mentioned in the deck";
    pub const VESTING_SCHEDULE: &str =
        "The company has not outlined their vesting schedule in the pitch deck";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub industry_type: String,
    pub pitch_clarity: f64,
    pub investment_score: f64,
    pub market_position: MarketPosition,
    pub market_analysis: MarketAnalysis,
    pub company_overview: CompanyOverview,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub funding_history: FundingHistory,
    pub competitors: Vec<Competitor>,
    pub market_comparison: MarketComparison,
    pub expert_opinions: Vec<ExpertOpinion>,
    pub expert_insights: ExpertInsights,
    pub final_verdict: FinalVerdict,
    pub proposed_deal_structure: DealStructure,
    pub key_questions: KeyQuestions,
    pub analyzed_at: DateTime<Utc>,
}

/// Competitive classification. The model is asked for one of the four named
/// positions; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MarketPosition {
    Leader,
    Challenger,
    NichePlayer,
    Emerging,
    Other(String),
}

impl Default for MarketPosition {
    fn default() -> Self {
        MarketPosition::Other(NOT_AVAILABLE.to_string())
    }
}

impl From<String> for MarketPosition {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "leader" => MarketPosition::Leader,
            "challenger" => MarketPosition::Challenger,
            "niche player" | "niche" | "nicheplayer" => MarketPosition::NichePlayer,
            "emerging" => MarketPosition::Emerging,
            _ => MarketPosition::Other(value),
        }
    }
}

impl From<MarketPosition> for String {
    fn from(value: MarketPosition) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MarketPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketPosition::Leader => f.write_str("Leader"),
            MarketPosition::Challenger => f.write_str("Challenger"),
            MarketPosition::NichePlayer => f.write_str("Niche Player"),
            MarketPosition::Emerging => f.write_str("Emerging"),
            MarketPosition::Other(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAnalysis {
    pub market_size: String,
    pub growth_rate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyOverview {
    pub company_name: String,
    pub industry: String,
    pub business_model: String,
    pub key_offerings: Vec<String>,
    pub market_position: MarketPosition,
    pub founded_on: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundingHistory {
    pub rounds: Vec<FundingRound>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingRound {
    #[serde(rename = "type")]
    pub round_type: String,
    pub amount: String,
    pub key_investors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competitor {
    pub name: String,
    pub key_investors: Vec<String>,
    pub amount_raised: String,
    pub market_position: String,
    pub strengths: String,
    pub growth_rate: String,
    pub business_model: String,
    pub key_differentiator: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketComparison {
    pub startup: Metrics,
    pub competitors: Vec<Metrics>,
}

/// Side-by-side comparison attributes for the startup or one competitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub market_share: String,
    pub growth_rate: String,
    pub revenue_model: String,
    pub differentiator: String,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            market_share: NOT_AVAILABLE.to_string(),
            growth_rate: NOT_AVAILABLE.to_string(),
            revenue_model: NOT_AVAILABLE.to_string(),
            differentiator: NOT_AVAILABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertOpinion {
    pub name: String,
    pub affiliation: String,
    pub summary: String,
    pub reference: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertInsights {
    pub opinions: Vec<InsightOpinion>,
    pub reputation: Reputation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightOpinion {
    pub name: String,
    pub title: String,
    pub affiliation: String,
    pub analysis: String,
    pub reference: String,
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reputation {
    pub news_media: f64,
    pub social_media: f64,
    pub investor_reviews: f64,
    pub customer_feedback: f64,
    pub overall: f64,
    pub sentiment: Sentiment,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    /// Case-insensitive; anything unrecognized is neutral.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Negative => "Negative",
            Sentiment::Neutral => "Neutral",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalVerdict {
    pub product_viability: f64,
    pub market_potential: f64,
    pub sustainability: f64,
    pub innovation: f64,
    pub exit_potential: f64,
    pub risk_factor: f64,
    pub competitive_edge: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DealStructure {
    Disclosed(DealTerms),
    Undisclosed { message: String },
}

impl DealStructure {
    pub fn undisclosed() -> Self {
        DealStructure::Undisclosed {
            message: placeholders::NO_DEAL_STRUCTURE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealTerms {
    pub investment_amount: String,
    pub equity_stake: String,
    pub valuation_cap: String,
    pub liquidation_preference: String,
    pub anti_dilution_protection: YesNo,
    pub board_seat: YesNo,
    pub vesting_schedule: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YesNo {
    Yes,
    No,
}

impl From<bool> for YesNo {
    fn from(value: bool) -> Self {
        if value {
            YesNo::Yes
        } else {
            YesNo::No
        }
    }
}

impl fmt::Display for YesNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            YesNo::Yes => "Yes",
            YesNo::No => "No",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyQuestions {
    pub market_strategy: QuestionAnswer,
    pub user_retention: QuestionAnswer,
    pub regulatory_risks: QuestionAnswer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: String,
}
