//! Asynchronous report streams
//!
//! Each report is requested per date window with a fixed column list. The
//! schema is derived from the columns: identifiers and labels are strings,
//! money, rates and averages are numbers, everything else is a count.

use super::types::{ReportDefinition, ReportFilter, StreamDefinition};
use crate::schema::{JsonSchema, SchemaProperty};

const SPONSORED_PRODUCTS: &str = "SPONSORED_PRODUCTS";
const SPONSORED_DISPLAY: &str = "SPONSORED_DISPLAY";

/// Columns carrying identifiers or labels
const STRING_COLUMNS: &[&str] = &[
    "adGroupId",
    "adGroupName",
    "adId",
    "adKeywordStatus",
    "advertisedAsin",
    "advertisedSku",
    "bidOptimization",
    "campaignApplicableBudgetRuleId",
    "campaignApplicableBudgetRuleName",
    "campaignBiddingStrategy",
    "campaignBudgetCurrencyCode",
    "campaignBudgetType",
    "campaignId",
    "campaignName",
    "campaignStatus",
    "keyword",
    "keywordId",
    "keywordType",
    "matchType",
    "portfolioId",
    "promotedAsin",
    "promotedSku",
    "retailer",
    "searchTerm",
    "targeting",
];

/// Name fragments of decimal-valued metrics
const DECIMAL_MARKERS: &[&str] = &[
    "sales", "Sales", "cost", "Cost", "spend", "Rate", "acos", "roas", "Share", "Amount", "Bid",
    "Royalties", "eCP", "ECP", "Average",
];

/// Sponsored Products attribution metrics shared by several reports
const SP_ATTRIBUTION: &[&str] = &[
    "purchases1d",
    "purchases7d",
    "purchases14d",
    "purchases30d",
    "purchasesSameSku1d",
    "purchasesSameSku7d",
    "purchasesSameSku14d",
    "purchasesSameSku30d",
    "unitsSoldClicks1d",
    "unitsSoldClicks7d",
    "unitsSoldClicks14d",
    "unitsSoldClicks30d",
    "sales1d",
    "sales7d",
    "sales14d",
    "sales30d",
    "attributedSalesSameSku1d",
    "attributedSalesSameSku7d",
    "attributedSalesSameSku14d",
    "attributedSalesSameSku30d",
    "unitsSoldSameSku1d",
    "unitsSoldSameSku7d",
    "unitsSoldSameSku14d",
    "unitsSoldSameSku30d",
    "kindleEditionNormalizedPagesRead14d",
    "kindleEditionNormalizedPagesRoyalties14d",
];

fn column_property(column: &str) -> SchemaProperty {
    if column == "date" {
        SchemaProperty::date()
    } else if STRING_COLUMNS.contains(&column) {
        SchemaProperty::string()
    } else if DECIMAL_MARKERS.iter().any(|marker| column.contains(marker)) {
        SchemaProperty::number()
    } else {
        SchemaProperty::integer()
    }
}

/// Schema covering the requested columns plus any extra labelled fields
fn report_schema(columns: &[String], extra: &[&str]) -> JsonSchema {
    JsonSchema::from_properties(
        columns
            .iter()
            .map(String::as_str)
            .chain(extra.iter().copied())
            .map(|column| (column.to_string(), column_property(column))),
    )
}

fn build(name: &str, report: ReportDefinition, keys: &[&str], extra: &[&str]) -> StreamDefinition {
    let schema = report_schema(&report.columns, extra);
    StreamDefinition::report(name, report)
        .with_schema(schema)
        .with_keys(keys)
}

fn concat(parts: &[&[&'static str]]) -> Vec<&'static str> {
    parts.iter().flat_map(|part| part.iter().copied()).collect()
}

pub(super) fn campaign_performance() -> StreamDefinition {
    let columns = concat(&[
        &["impressions", "clicks", "cost"],
        SP_ATTRIBUTION,
        &[
            "qualifiedBorrows",
            "royaltyQualifiedBorrows",
            "addToList",
            "date",
            "campaignBiddingStrategy",
            "costPerClick",
            "clickThroughRate",
            "spend",
            "acosClicks14d",
            "roasClicks14d",
            "retailer",
            "campaignName",
            "campaignId",
            "campaignStatus",
            "campaignBudgetAmount",
            "campaignBudgetType",
            "campaignRuleBasedBudgetAmount",
            "campaignApplicableBudgetRuleId",
            "campaignApplicableBudgetRuleName",
            "campaignBudgetCurrencyCode",
            "topOfSearchImpressionShare",
        ],
    ]);

    build(
        "campaign_performance_report",
        ReportDefinition::new("spCampaigns", SPONSORED_PRODUCTS, &["campaign"], &columns),
        &["campaignId", "date"],
        &[],
    )
}

pub(super) fn search_terms() -> StreamDefinition {
    let columns = [
        "adGroupId",
        "campaignId",
        "keywordId",
        "targeting",
        "searchTerm",
        "impressions",
        "clicks",
        "cost",
        "purchases1d",
        "purchases7d",
        "purchases14d",
        "purchases30d",
        "date",
    ];

    build(
        "search_terms_report",
        ReportDefinition::new("spSearchTerm", SPONSORED_PRODUCTS, &["searchTerm"], &columns),
        &["campaignId", "searchTerm", "keywordId", "date"],
        &[
            "campaignName",
            "campaignStatus",
            "campaignBudgetType",
            "campaignBudgetAmount",
            "campaignBudgetCurrencyCode",
            "portfolioId",
            "adGroupName",
            "keyword",
            "keywordType",
            "matchType",
            "keywordBid",
            "adKeywordStatus",
        ],
    )
}

pub(super) fn advertised_product() -> StreamDefinition {
    let columns = concat(&[
        &[
            "date",
            "campaignName",
            "campaignId",
            "adGroupName",
            "adGroupId",
            "adId",
            "portfolioId",
            "impressions",
            "clicks",
            "costPerClick",
            "clickThroughRate",
            "cost",
            "spend",
            "campaignBudgetCurrencyCode",
            "campaignBudgetAmount",
            "campaignBudgetType",
            "campaignStatus",
            "advertisedAsin",
            "advertisedSku",
        ],
        SP_ATTRIBUTION,
        &[
            "salesOtherSku7d",
            "unitsSoldOtherSku7d",
            "acosClicks7d",
            "acosClicks14d",
            "roasClicks7d",
            "roasClicks14d",
        ],
    ]);

    build(
        "advertised_product_report",
        ReportDefinition::new(
            "spAdvertisedProduct",
            SPONSORED_PRODUCTS,
            &["advertiser"],
            &columns,
        )
        .with_filter(ReportFilter::new(
            "adCreativeStatus",
            &["ENABLED", "PAUSED", "ARCHIVED"],
        )),
        &["date", "campaignId", "adGroupId", "adId", "advertisedAsin"],
        &[],
    )
}

pub(super) fn sd_advertised_product() -> StreamDefinition {
    let columns = [
        "date",
        "adGroupId",
        "adGroupName",
        "adId",
        "promotedAsin",
        "promotedSku",
        "purchasesClicks",
        "purchasesPromotedClicks",
        "detailPageViewsClicks",
        "newToBrandPurchasesClicks",
        "salesClicks",
        "salesPromotedClicks",
        "newToBrandSalesClicks",
        "unitsSoldClicks",
        "newToBrandUnitsSoldClicks",
        "bidOptimization",
        "campaignId",
        "campaignName",
        "clicks",
        "cost",
        "campaignBudgetCurrencyCode",
        "impressions",
        "purchases",
        "impressionsViews",
        "detailPageViews",
        "sales",
        "unitsSold",
        "newToBrandPurchases",
        "newToBrandSales",
        "newToBrandUnitsSold",
        "brandedSearchesClicks",
        "brandedSearches",
        "brandedSearchesViews",
        "brandedSearchRate",
        "eCPBrandSearch",
        "videoCompleteViews",
        "videoFirstQuartileViews",
        "videoMidpointViews",
        "videoThirdQuartileViews",
        "videoUnmutes",
        "viewabilityRate",
        "viewClickThroughRate",
        "impressionsFrequencyAverage",
        "cumulativeReach",
        "newToBrandDetailPageViews",
        "newToBrandDetailPageViewViews",
        "newToBrandDetailPageViewClicks",
        "addToCart",
        "addToCartViews",
        "addToCartClicks",
        "addToCartRate",
        "eCPAddToCart",
        "newToBrandDetailPageViewRate",
        "newToBrandECPDetailPageView",
    ];

    build(
        "sd_advertised_product_report",
        ReportDefinition::new(
            "sdAdvertisedProduct",
            SPONSORED_DISPLAY,
            &["advertiser"],
            &columns,
        ),
        &["date", "campaignId", "adGroupId", "adId"],
        &[],
    )
}

pub(super) fn keywords_targeting_summary() -> StreamDefinition {
    let columns = concat(&[
        &[
            "date",
            "impressions",
            "clicks",
            "costPerClick",
            "clickThroughRate",
            "cost",
        ],
        SP_ATTRIBUTION,
        &[
            "salesOtherSku7d",
            "unitsSoldOtherSku7d",
            "acosClicks7d",
            "acosClicks14d",
            "roasClicks7d",
            "roasClicks14d",
            "keywordId",
            "keyword",
            "campaignBudgetCurrencyCode",
            "portfolioId",
            "campaignName",
            "campaignId",
            "campaignBudgetType",
            "campaignBudgetAmount",
            "campaignStatus",
            "keywordBid",
            "adGroupName",
            "adGroupId",
            "keywordType",
            "matchType",
            "targeting",
            "adKeywordStatus",
        ],
    ]);

    build(
        "keywords_targeting_summary_report",
        ReportDefinition::new("spTargeting", SPONSORED_PRODUCTS, &["targeting"], &columns)
            .with_filter(ReportFilter::new(
                "keywordType",
                &[
                    "BROAD",
                    "PHRASE",
                    "EXACT",
                    "TARGETING_EXPRESSION",
                    "TARGETING_EXPRESSION_PREDEFINED",
                ],
            ))
            .with_filter(ReportFilter::new(
                "adKeywordStatus",
                &["ENABLED", "PAUSED", "ARCHIVED"],
            )),
        &["date", "campaignId", "targeting"],
        &[],
    )
}
