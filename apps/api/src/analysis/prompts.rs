// Analysis pipeline LLM prompt templates.
// All prompts for the analysis module are defined here.

/// Number of leading characters of the deck sent to the validation check.
pub const VALIDATION_SAMPLE_CHARS: usize = 1500;

pub const ANALYSIS_INSTRUCTIONS: &str = r#"You are an expert investment analyst reviewing a startup pitch deck.
Produce a detailed, specific and realistic investment analysis of the pitch deck content below.
Where the deck is silent, make reasonable assumptions from industry standards and current market conditions.

OUTPUT SCHEMA (return exactly this structure):
{
  "pitchClarity": number,            // 1-10, how clearly the deck communicates
  "investmentScore": number,         // 1-10, overall investment attractiveness
  "profile": {
    "companyName": "string",
    "industry": "string",
    "foundedOn": "YYYY-MM-DD" | null,
    "problemStatement": "string",
    "solution": "string",
    "marketSize": "string",
    "businessModel": "string",
    "competitiveAdvantage": "string",
    "teamHighlights": "string",
    "keyOfferings": ["string"],
    "marketPosition": "Leader" | "Challenger" | "Niche Player" | "Emerging"
  },
  "strengthsWeaknesses": { "strengths": ["string"], "weaknesses": ["string"] },
  "competitors": [
    {
      "id": "competitor1",           // competitor1, competitor2, ... in order
      "name": "string",
      "keyInvestors": ["string"],
      "amountRaised": "string",
      "marketPosition": "string",
      "strengths": "string",
      "growthRate": "string",
      "businessModel": "string",
      "keyDifferentiator": "string"
    }
  ],
  "fundingHistory": [
    { "round": "string", "amount": "string", "investors": ["string"], "status": "string" }
  ],
  "marketComparison": {
    "metrics": {
      "marketShare":    { "startup": "string", "competitor1": "string" },
      "revenueModel":   { "startup": "string", "competitor1": "string" },
      "growthRate":     { "startup": "string", "competitor1": "string" },
      "differentiator": { "startup": "string", "competitor1": "string" }
    }
  },
  "expertOpinions": [
    { "name": "string", "affiliation": "string", "summary": "string", "reference": "string", "date": "YYYY-MM-DD" }
  ],
  "expertConclusion": {
    "productViability": number,
    "marketPotential": number,
    "sustainability": number,
    "innovation": number,
    "exitPotential": number,
    "riskFactors": number,
    "competitiveAdvantage": number
  },
  "dealStructure": {
    "investmentAmount": "string",
    "equityStake": "string",
    "valuationCap": "string",
    "liquidationPreference": "string",
    "antiDilution": boolean,
    "boardSeat": boolean,
    "vestingSchedule": "string"
  },
  "expertInsights": {
    "expertOpinions": [
      { "name": "string", "title": "string", "affiliation": "string", "analysis": "string", "reference": "string", "date": "YYYY-MM-DD" }
    ],
    "reputationAnalysis": {
      "newsMedia": number,
      "socialMedia": number,
      "investorReviews": number,
      "customerFeedback": number,
      "overall": number,
      "sentiment": "Positive" | "Negative" | "Neutral"
    }
  }
}

RULES:
1. All numeric ratings are on a 1-10 scale.
2. All dates are "YYYY-MM-DD".
3. Identify at least 3-4 major competitors. Every competitor gets an "id" and every
   marketComparison metric has one key per competitor id plus "startup".
4. Provide one detailed, genuine expert opinion.
5. Omit "dealStructure" entirely if the deck proposes no deal terms.
6. Return ONLY the JSON object, with no code fences.

PITCH DECK CONTENT:
"#;

/// Builds the analysis prompt: the fixed instructions followed by the
/// extracted deck text, verbatim.
pub fn build_prompt(document_text: &str) -> String {
    let mut prompt = String::with_capacity(ANALYSIS_INSTRUCTIONS.len() + document_text.len());
    prompt.push_str(ANALYSIS_INSTRUCTIONS);
    prompt.push_str(document_text);
    prompt
}

pub const VALIDATION_PROMPT: &str = r#"Decide whether the following content comes from a startup pitch deck.
Typical indicators: company or product introduction, problem statement, solution,
market analysis, business model, team, financial projections, investment ask.

CONTENT:
{sample}

OUTPUT SCHEMA (return exactly this structure):
{ "isPitchDeck": boolean, "confidence": number between 0 and 1, "reason": "brief explanation" }"#;
