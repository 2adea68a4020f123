use super::domain::{ParameterDefinition, ParameterType};

/// Starter catalogue offered to an empty registry.
pub fn default_parameters() -> Vec<ParameterDefinition> {
    vec![
        ParameterDefinition::new("fico_score", "FICO Credit Score", ParameterType::Number)
            .with_description("Personal credit score (300-850)"),
        ParameterDefinition::new("annual_revenue", "Annual Revenue", ParameterType::Currency)
            .with_description("Business annual revenue in dollars"),
        ParameterDefinition::new("years_in_business", "Years in Business", ParameterType::Number)
            .with_description("How many years the business has been operating"),
        ParameterDefinition::new("business_type", "Business Type", ParameterType::Select)
            .with_options([
                "Trucking",
                "Construction",
                "Manufacturing",
                "Retail",
                "Services",
                "Other",
            ])
            .with_description("Type of business"),
        ParameterDefinition::new("loan_amount", "Loan Amount Requested", ParameterType::Currency)
            .with_description("Amount of funding requested"),
        ParameterDefinition::new(
            "has_bankruptcy",
            "Bankruptcy in Last 7 Years",
            ParameterType::Boolean,
        )
        .with_description("Whether the business or owner filed for bankruptcy in the last 7 years"),
        ParameterDefinition::new(
            "collateral_available",
            "Collateral Available",
            ParameterType::Boolean,
        )
        .with_description("Whether collateral is available to secure the loan"),
    ]
}
