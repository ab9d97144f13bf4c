use crate::analysis::display::{ReportView, StarRating};
use crate::analysis::record::AnalysisRecord;

/// Renders a stored analysis as a downloadable Markdown report.
pub fn render_report_md(record: &AnalysisRecord) -> String {
    let view = ReportView::from_record(record);
    let overview = &record.company_overview;

    let mut md = format!("# Investment Analysis: {}\n\n", overview.company_name);
    md.push_str(&format!(
        "_Analyzed {}_\n\n",
        record.analyzed_at.format("%Y-%m-%d %H:%M UTC")
    ));

    md.push_str("## Summary\n\n");
    md.push_str(&format!(
        "- **Investment score:** {:.1}/10 ({:.0}%)\n",
        record.investment_score, view.investment_percentage
    ));
    md.push_str(&format!("- **Pitch clarity:** {:.1}/10\n", record.pitch_clarity));
    md.push_str(&format!("- **Industry:** {}\n", record.industry_type));
    md.push_str(&format!("- **Market position:** {}\n", record.market_position));
    md.push_str(&format!(
        "- **Risk:** {} ({:.1}/10)\n",
        view.risk_level.as_str(),
        record.final_verdict.risk_factor
    ));
    md.push_str(&format!(
        "- **Strengths detected:** {} / **Issues detected:** {}\n\n",
        view.strengths_detected, view.issues_detected
    ));
    md.push_str(&format!("{}\n\n", view.verdict));

    md.push_str("## Company Overview\n\n");
    md.push_str(&format!("- **Business model:** {}\n", overview.business_model));
    md.push_str(&format!("- **Founded:** {}\n", overview.founded_on));
    md.push_str(&format!(
        "- **Market size:** {}\n",
        record.market_analysis.market_size
    ));
    md.push_str(&format!(
        "- **Growth rate:** {}\n",
        record.market_analysis.growth_rate
    ));
    if !overview.key_offerings.is_empty() {
        md.push_str(&format!(
            "- **Key offerings:** {}\n",
            overview.key_offerings.join(", ")
        ));
    }
    md.push('\n');

    push_list(&mut md, "Strengths", &record.strengths);
    push_list(&mut md, "Weaknesses", &record.weaknesses);

    if !record.funding_history.rounds.is_empty() {
        md.push_str("## Funding History\n\n");
        md.push_str("| Round | Amount | Investors |\n|---|---|---|\n");
        for round in &record.funding_history.rounds {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                cell(&round.round_type),
                cell(&round.amount),
                cell(&round.key_investors.join(", "))
            ));
        }
        md.push('\n');
    }

    md.push_str("## Market Comparison\n\n");
    md.push_str("| | Market share | Growth | Revenue model | Differentiator |\n|---|---|---|---|---|\n");
    let startup = &record.market_comparison.startup;
    md.push_str(&format!(
        "| **{}** | {} | {} | {} | {} |\n",
        cell(&overview.company_name),
        cell(&startup.market_share),
        cell(&startup.growth_rate),
        cell(&startup.revenue_model),
        cell(&startup.differentiator)
    ));
    for (competitor, metrics) in record
        .competitors
        .iter()
        .zip(&record.market_comparison.competitors)
    {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            cell(&competitor.name),
            cell(&metrics.market_share),
            cell(&metrics.growth_rate),
            cell(&metrics.revenue_model),
            cell(&metrics.differentiator)
        ));
    }
    md.push('\n');

    md.push_str("## Final Verdict\n\n");
    for point in &view.radar {
        md.push_str(&format!("- **{}:** {:.1}/10\n", point.subject, point.value));
    }
    md.push('\n');

    md.push_str("## Reputation\n\n");
    let reputation = &record.expert_insights.reputation;
    let stars = &view.reputation_stars;
    md.push_str(&format!("- **Sentiment:** {}\n", reputation.sentiment.as_str()));
    for (label, rating) in [
        ("News media", stars.news_media),
        ("Social media", stars.social_media),
        ("Investor reviews", stars.investor_reviews),
        ("Customer feedback", stars.customer_feedback),
        ("Overall", stars.overall),
    ] {
        md.push_str(&format!("- **{label}:** {}\n", star_string(rating)));
    }
    md.push('\n');

    if !record.expert_opinions.is_empty() {
        md.push_str("## Expert Opinions\n\n");
        for opinion in &record.expert_opinions {
            md.push_str(&format!(
                "> {}\n>\n> -- {}, {} ({})\n\n",
                opinion.summary, opinion.name, opinion.affiliation, opinion.date
            ));
        }
    }

    md.push_str("## Proposed Deal Structure\n\n");
    if let Some(message) = &view.deal_message {
        md.push_str(&format!("{message}\n\n"));
    }
    for term in &view.deal_terms {
        md.push_str(&format!("- **{}:** {}\n", term.label, term.value));
    }
    md.push('\n');

    md.push_str("## Key Questions\n\n");
    let questions = &record.key_questions;
    for qa in [
        &questions.market_strategy,
        &questions.user_retention,
        &questions.regulatory_risks,
    ] {
        md.push_str(&format!("### {}\n\n{}\n\n", qa.question, qa.answer));
    }

    md
}

fn push_list(md: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    md.push_str(&format!("## {title}\n\n"));
    for item in items {
        md.push_str(&format!("- {item}\n"));
    }
    md.push('\n');
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn star_string(rating: StarRating) -> String {
    let mut s = "★".repeat(rating.full as usize);
    s.push_str(&"⯪".repeat(rating.half as usize));
    s.push_str(&"☆".repeat(rating.empty as usize));
    s
}
