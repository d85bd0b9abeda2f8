//! Sponsored Products entity streams
//!
//! Campaigns and ad groups are top-level parents; everything else is
//! scoped to one of them through a parent-id filter.

use super::types::{ParentLink, StreamDefinition};
use crate::pagination::PaginationConfig;
use crate::schema::{JsonSchema, SchemaProperty};
use serde_json::json;
use std::collections::BTreeMap;

fn props(fields: Vec<(&str, SchemaProperty)>) -> BTreeMap<String, SchemaProperty> {
    fields
        .into_iter()
        .map(|(name, property)| (name.to_string(), property))
        .collect()
}

/// `extendedData` block shared by ad groups and keywords
fn extended_data() -> SchemaProperty {
    SchemaProperty::object(Some(props(vec![
        ("creationDate", SchemaProperty::number()),
        ("creationDateTime", SchemaProperty::date_time()),
        ("lastUpdateDate", SchemaProperty::number()),
        ("lastUpdateDateTime", SchemaProperty::date_time()),
        ("servingStatus", SchemaProperty::string()),
        ("servingStatusDetails", SchemaProperty::array(SchemaProperty::object(None))),
        ("statusReasons", SchemaProperty::array(SchemaProperty::string())),
    ])))
}

pub(super) fn campaigns() -> StreamDefinition {
    let budget = SchemaProperty::object(Some(props(vec![
        ("budget", SchemaProperty::number()),
        ("budgetType", SchemaProperty::string()),
    ])));
    let placement = SchemaProperty::object(Some(props(vec![
        ("placement", SchemaProperty::string()),
        ("percentage", SchemaProperty::number()),
    ])));
    let dynamic_bidding = SchemaProperty::object(Some(props(vec![
        ("strategy", SchemaProperty::string()),
        ("placementBidding", SchemaProperty::array(placement)),
    ])));

    StreamDefinition::list(
        "campaigns",
        "/sp/campaigns/list",
        "application/vnd.spCampaign.v3+json",
        "$.campaigns",
    )
    .with_id_field("campaignId")
    .with_schema(JsonSchema::from_properties(vec![
        ("campaignId", SchemaProperty::string()),
        ("name", SchemaProperty::string()),
        ("budget", budget),
        ("targetingType", SchemaProperty::string()),
        ("state", SchemaProperty::string()),
        ("startDate", SchemaProperty::date()),
        ("endDate", SchemaProperty::date()),
        ("premiumBidAdjustment", SchemaProperty::boolean()),
        ("dynamicBidding", dynamic_bidding),
        ("servingStatus", SchemaProperty::string()),
    ]))
    .with_keys(&["campaignId"])
}

pub(super) fn adgroups() -> StreamDefinition {
    StreamDefinition::list(
        "adgroups",
        "/sp/adGroups/list",
        "application/vnd.spAdGroup.v3+json",
        "$.adGroups",
    )
    .with_body("includeExtendedDataFields", json!(true))
    .with_id_field("adGroupId")
    .with_schema(JsonSchema::from_properties(vec![
        ("adGroupId", SchemaProperty::string()),
        ("campaignId", SchemaProperty::string()),
        ("name", SchemaProperty::string()),
        ("state", SchemaProperty::string()),
        ("defaultBid", SchemaProperty::number()),
        ("extendedData", extended_data()),
    ]))
    .with_keys(&["adGroupId"])
}

pub(super) fn keywords() -> StreamDefinition {
    StreamDefinition::list(
        "keywords",
        "/sp/keywords/list",
        "application/vnd.spKeyword.v3+json",
        "$.keywords",
    )
    .with_body("includeExtendedDataFields", json!(true))
    .with_parent(ParentLink::include("campaigns", "campaignIdFilter", "campaignId"))
    .with_schema(JsonSchema::from_properties(vec![
        ("keywordId", SchemaProperty::string()),
        ("adGroupId", SchemaProperty::string()),
        ("campaignId", SchemaProperty::string()),
        ("keywordText", SchemaProperty::string()),
        ("matchType", SchemaProperty::string()),
        ("state", SchemaProperty::string()),
        ("bid", SchemaProperty::number()),
        ("extendedData", extended_data()),
    ]))
    .with_keys(&["keywordId"])
}

pub(super) fn targets() -> StreamDefinition {
    StreamDefinition::list(
        "targets",
        "/sp/targets/list",
        "application/vnd.spTargetingClause.v3+json",
        "$.targetingClauses",
    )
    .with_parent(ParentLink::include("campaigns", "campaignIdFilter", "campaignId"))
    .with_schema(JsonSchema::from_properties(vec![
        ("targetId", SchemaProperty::string()),
        ("adGroupId", SchemaProperty::string()),
        ("campaignId", SchemaProperty::string()),
        ("state", SchemaProperty::string()),
        ("expressionType", SchemaProperty::string()),
        ("expression", SchemaProperty::array(SchemaProperty::object(None))),
        ("resolvedExpression", SchemaProperty::array(SchemaProperty::object(None))),
        ("bid", SchemaProperty::number()),
    ]))
    .with_keys(&["targetId"])
}

pub(super) fn negative_keywords() -> StreamDefinition {
    StreamDefinition::list(
        "negative_keywords",
        "/sp/negativeKeywords/list",
        "application/vnd.spNegativeKeyword.v3+json",
        "$.negativeKeywords",
    )
    .with_parent(ParentLink::include("campaigns", "campaignIdFilter", "campaignId"))
    .with_schema(JsonSchema::from_properties(vec![
        ("keywordId", SchemaProperty::string()),
        ("adGroupId", SchemaProperty::string()),
        ("campaignId", SchemaProperty::string()),
        ("keywordText", SchemaProperty::string()),
        ("matchType", SchemaProperty::string()),
        ("state", SchemaProperty::string()),
    ]))
    .with_keys(&["keywordId"])
}

pub(super) fn productads() -> StreamDefinition {
    StreamDefinition::list(
        "productads",
        "/sp/productAds/list",
        "application/vnd.spProductAd.v3+json",
        "$.productAds",
    )
    .with_parent(ParentLink::include("adgroups", "adGroupIdFilter", "adGroupId"))
    .with_schema(JsonSchema::from_properties(vec![
        ("adId", SchemaProperty::string()),
        ("adGroupId", SchemaProperty::string()),
        ("campaignId", SchemaProperty::string()),
        ("sku", SchemaProperty::string()),
        ("asin", SchemaProperty::string()),
        ("state", SchemaProperty::string()),
        (
            "extendedData",
            SchemaProperty::object(Some(props(vec![
                ("creationDate", SchemaProperty::number()),
                ("lastUpdateDate", SchemaProperty::number()),
                ("servingStatus", SchemaProperty::string()),
            ]))),
        ),
    ]))
    .with_keys(&["adId"])
}

pub(super) fn campaign_budgets() -> StreamDefinition {
    StreamDefinition::list(
        "campaign_budgets",
        "/sp/campaigns/budget/usage",
        "application/vnd.spCampaignBudget.v3+json",
        "$.success",
    )
    .without_state_filter()
    .with_pagination(PaginationConfig::None)
    .with_parent(ParentLink::id_list("campaigns", "campaignIds", "campaignId"))
    .with_schema(JsonSchema::from_properties(vec![
        ("campaignId", SchemaProperty::string()),
        ("budget", SchemaProperty::number()),
        ("budgetUsagePercent", SchemaProperty::number()),
        ("usageUpdatedTimestamp", SchemaProperty::date_time()),
        ("index", SchemaProperty::integer()),
    ]))
    .with_keys(&["campaignId"])
}
