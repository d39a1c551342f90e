use std::sync::Arc;

use chrono::Local;
use clap::Args;

use loanscout::error::AppError;
use loanscout::qualification::{
    AnswerMap, AnswerValue, QualificationService, ScoringConfig, StoreError,
};

use crate::infra::seed_catalog;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print the full scored candidate list before every question.
    #[arg(long)]
    pub(crate) show_scores: bool,
}

/// Walks a scripted applicant through the adaptive interview against the
/// seeded catalog, printing the narrowing product set at each step.
pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let catalog = Arc::new(seed_catalog());
    let service = QualificationService::new(catalog.clone(), catalog, ScoringConfig::default());

    // Discharged bankrupt in Victoria with some adverse history, full
    // time work, and a mid-size owner-occupier loan.
    let script: Vec<(&str, AnswerValue)> = vec![
        ("state", AnswerValue::Text("VIC".to_string())),
        (
            "bankruptcy_status",
            AnswerValue::Text("Discharged".to_string()),
        ),
        ("has_default_over_1k", AnswerValue::Bool(false)),
        ("has_adverse_credit", AnswerValue::Bool(true)),
        (
            "has_adverse_credit_explanation",
            AnswerValue::Text("Missed card payments during 2021".to_string()),
        ),
        (
            "employment_status",
            AnswerValue::Text("FullTime".to_string()),
        ),
        ("annual_income", AnswerValue::Number(72_000.0)),
        ("monthly_expenses", AnswerValue::Number(2_800.0)),
        ("loan_purpose", AnswerValue::Text("OwnerOccupied".to_string())),
        ("loan_amount_requested", AnswerValue::Number(420_000.0)),
        ("deposit_amount", AnswerValue::Number(80_000.0)),
    ];
    let scripted: AnswerMap = script
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

    println!(
        "Loan qualification demo ({})",
        Local::now().date_naive()
    );

    let mut products = service.baseline_product_ids().await?;
    let mut answers = AnswerMap::new();
    let mut last_group: Option<String> = None;

    println!("Starting panel: {} products", products.len());

    loop {
        let next = service
            .select_next_question(&products, &answers, last_group.as_deref())
            .await?;
        let Some(question) = next else { break };

        if args.show_scores {
            let report = service
                .available_questions(&products, &answers, last_group.as_deref())
                .await?;
            println!("  Candidates in play:");
            for scored in &report.questions {
                println!(
                    "    - {} (score {:.3})",
                    scored.question.question_key, scored.score
                );
            }
        }

        let answer = scripted
            .get(&question.question_key)
            .ok_or_else(|| StoreError::QuestionKeyNotFound(question.question_key.clone()))?
            .clone();

        println!("Q: {}", question.question_text);
        println!(
            "A: {}",
            serde_json::to_string(&answer).unwrap_or_else(|_| "<unprintable>".to_string())
        );

        last_group = Some(question.question_group.clone());
        answers.insert(question.question_key, answer);
        products = service.filter_products(&products, &answers).await;
        println!("   -> {} products remain", products.len());

        if products.is_empty() {
            println!("No products left; the applicant does not qualify.");
            return Ok(());
        }
    }

    println!("\nInterview complete. Qualifying products:");
    for product in service.product_summaries(&products).await? {
        println!(
            "- {} ({}) | {} | rate {:.2}% (worst case {:.2}%) | ${:.0} to ${:.0}",
            product.product_name,
            product.lender_name,
            product.loan_type,
            product.base_rate,
            product.worst_case_rate,
            product.min_loan_amount,
            product.max_loan_amount,
        );
    }

    Ok(())
}
