//! Resource operation table.
//!
//! Every Sponsored Products resource call is one row: a name, an HTTP
//! method, a path template with `{placeholders}` and the shape of its
//! payload. The request pipeline never needs to know about individual
//! resources.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::errors::{AdvertisingError, AdvertisingResult};
use crate::transport::HttpMethod;

/// Characters escaped in a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// How an operation carries its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// No payload.
    None,
    /// Parameters encoded into the query string.
    Query,
    /// JSON request body.
    Body,
    /// JSON request body with id fields normalized to integers.
    BodyWithIds,
}

/// One resource operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    /// Operation name used by `invoke`.
    pub name: &'static str,
    /// HTTP method.
    pub method: HttpMethod,
    /// Path template relative to the API base URL.
    pub path: &'static str,
    /// Payload shape.
    pub payload: Payload,
}

const fn op(name: &'static str, method: HttpMethod, path: &'static str, payload: Payload) -> Operation {
    Operation {
        name,
        method,
        path,
        payload,
    }
}

/// Creates a report job.
pub const REQUEST_REPORT: Operation = op(
    "request_report",
    HttpMethod::Post,
    "v2/{campaignType}/{recordType}/report",
    Payload::Body,
);

/// Reads the status of a report job.
pub const GET_REPORT_STATUS: Operation =
    op("get_report_status", HttpMethod::Get, "v2/reports/{reportId}", Payload::None);

/// Creates a snapshot job.
pub const REQUEST_SNAPSHOT: Operation = op(
    "request_snapshot",
    HttpMethod::Post,
    "v2/{campaignType}/{recordType}/snapshot",
    Payload::Body,
);

/// Reads the status of a snapshot job.
pub const GET_SNAPSHOT_STATUS: Operation = op(
    "get_snapshot_status",
    HttpMethod::Get,
    "v2/{campaignType}/snapshots/{snapshotId}",
    Payload::None,
);

use HttpMethod::{Delete, Get, Post, Put};
use Payload::{Body, BodyWithIds, Query};

/// All resource operations.
pub static OPERATIONS: &[Operation] = &[
    // Profiles
    op("register", Put, "profiles/register", Body),
    op("list_profiles", Get, "v2/sp/profiles", Payload::None),
    op("register_profile", Put, "v2/sp/profiles/register", Body),
    op("register_profile_status", Get, "v2/sp/profiles/register/{profileId}/status", Payload::None),
    op("get_profile", Get, "v2/sp/profiles/{profileId}", Payload::None),
    op("update_profiles", Put, "v2/sp/profiles", BodyWithIds),
    // Campaigns
    op("get_campaign", Get, "v2/sp/campaigns/{campaignId}", Payload::None),
    op("get_campaign_ex", Get, "v2/sp/campaigns/extended/{campaignId}", Payload::None),
    op("create_campaigns", Post, "v2/sp/campaigns", BodyWithIds),
    op("update_campaigns", Put, "v2/sp/campaigns", BodyWithIds),
    op("archive_campaign", Delete, "v2/sp/campaigns/{campaignId}", Payload::None),
    op("list_campaigns", Get, "v2/sp/campaigns", Query),
    op("list_campaigns_ex", Get, "v2/sp/campaigns/extended", Query),
    // Ad groups
    op("get_ad_group", Get, "v2/sp/adGroups/{adGroupId}", Payload::None),
    op("get_ad_group_ex", Get, "v2/sp/adGroups/extended/{adGroupId}", Payload::None),
    op("create_ad_groups", Post, "v2/sp/adGroups", BodyWithIds),
    op("update_ad_groups", Put, "v2/sp/adGroups", BodyWithIds),
    op("archive_ad_group", Delete, "v2/sp/adGroups/{adGroupId}", Payload::None),
    op("list_ad_groups", Get, "v2/sp/adGroups", Query),
    op("list_ad_groups_ex", Get, "v2/sp/adGroups/extended", Query),
    // Biddable keywords
    op("get_biddable_keyword", Get, "v2/sp/keywords/{keywordId}", Payload::None),
    op("get_biddable_keyword_ex", Get, "v2/sp/keywords/extended/{keywordId}", Payload::None),
    op("create_biddable_keywords", Post, "v2/sp/keywords", BodyWithIds),
    op("update_biddable_keywords", Put, "v2/sp/keywords", BodyWithIds),
    op("archive_biddable_keyword", Delete, "v2/sp/keywords/{keywordId}", Payload::None),
    op("list_biddable_keywords", Get, "v2/sp/keywords", Query),
    op("list_biddable_keywords_ex", Get, "v2/sp/keywords/extended", Query),
    // Targets
    op("update_biddable_targets", Put, "v2/sp/targets", BodyWithIds),
    // Negative keywords
    op("get_negative_keyword", Get, "v2/sp/negativeKeywords/{keywordId}", Payload::None),
    op("get_negative_keyword_ex", Get, "v2/sp/negativeKeywords/extended/{keywordId}", Payload::None),
    op("create_negative_keywords", Post, "v2/sp/negativeKeywords", BodyWithIds),
    op("update_negative_keywords", Put, "v2/sp/negativeKeywords", BodyWithIds),
    op("archive_negative_keyword", Delete, "v2/sp/negativeKeywords/{keywordId}", Payload::None),
    op("list_negative_keywords", Get, "v2/sp/negativeKeywords", Query),
    op("list_negative_keywords_ex", Get, "v2/sp/negativeKeywords/extended", Query),
    // Campaign negative keywords
    op("get_campaign_negative_keyword", Get, "v2/sp/campaignNegativeKeywords/{keywordId}", Payload::None),
    op(
        "get_campaign_negative_keyword_ex",
        Get,
        "v2/sp/campaignNegativeKeywords/extended/{keywordId}",
        Payload::None,
    ),
    op("create_campaign_negative_keywords", Post, "v2/sp/campaignNegativeKeywords", BodyWithIds),
    op("update_campaign_negative_keywords", Put, "v2/sp/campaignNegativeKeywords", BodyWithIds),
    op(
        "remove_campaign_negative_keyword",
        Delete,
        "v2/sp/campaignNegativeKeywords/{keywordId}",
        Payload::None,
    ),
    op("list_campaign_negative_keywords", Get, "v2/sp/campaignNegativeKeywords", Query),
    op("list_campaign_negative_keywords_ex", Get, "v2/sp/campaignNegativeKeywords/extended", Query),
    // Product ads
    op("get_product_ad", Get, "v2/sp/productAds/{productAdId}", Payload::None),
    op("get_product_ad_ex", Get, "v2/sp/productAds/extended/{productAdId}", Payload::None),
    op("create_product_ads", Post, "v2/sp/productAds", BodyWithIds),
    op("update_product_ads", Put, "v2/sp/productAds", BodyWithIds),
    op("archive_product_ad", Delete, "v2/sp/productAds/{productAdId}", Payload::None),
    op("list_product_ads", Get, "v2/sp/productAds", Query),
    op("list_product_ads_ex", Get, "v2/sp/productAds/extended", Query),
    // Bid recommendations
    op("get_ad_group_bid_recommendations", Get, "v2/sp/adGroups/{adGroupId}/bidRecommendations", Payload::None),
    op("get_keyword_bid_recommendations", Get, "v2/sp/keywords/{keywordId}/bidRecommendations", Payload::None),
    op("bulk_get_keyword_bid_recommendations", Post, "v2/sp/keywords/bidRecommendations", Body),
    // Keyword suggestions
    op("get_ad_group_keyword_suggestions", Get, "v2/sp/adGroups/{adGroupId}/suggested/keywords", Query),
    op(
        "get_ad_group_keyword_suggestions_ex",
        Get,
        "v2/sp/adGroups/{adGroupId}/suggested/keywords/extended",
        Query,
    ),
    op("get_asin_keyword_suggestions", Get, "v2/sp/asins/{asin}/suggested/keywords", Query),
    op("bulk_get_asin_keyword_suggestions", Post, "v2/sp/asins/suggested/keywords", Body),
    // Reports and snapshots
    REQUEST_SNAPSHOT,
    GET_SNAPSHOT_STATUS,
    REQUEST_REPORT,
    GET_REPORT_STATUS,
];

/// Looks up an operation by name.
pub fn find(name: &str) -> Option<&'static Operation> {
    OPERATIONS.iter().find(|operation| operation.name == name)
}

impl Operation {
    /// Names of the placeholders in the path template, in order.
    pub fn placeholders(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut rest = self.path;
        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            names.push(&rest[start + 1..start + len]);
            rest = &rest[start + len + 1..];
        }
        names
    }

    /// Substitutes path parameters into the template.
    ///
    /// Every placeholder must be supplied with a non-empty value. Values are
    /// percent-encoded; parameters the template does not use are ignored.
    pub fn render_path(&self, params: &[(&str, &str)]) -> AdvertisingResult<String> {
        let mut path = String::with_capacity(self.path.len() + 16);
        let mut rest = self.path;

        while let Some(start) = rest.find('{') {
            let len = rest[start..].find('}').ok_or_else(|| {
                AdvertisingError::validation(format!("Malformed path template {}", self.path))
            })?;
            let name = &rest[start + 1..start + len];

            let value = params
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.trim())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    AdvertisingError::validation(format!(
                        "Operation {} requires path parameter {name}",
                        self.name
                    ))
                })?;

            path.push_str(&rest[..start]);
            path.extend(utf8_percent_encode(value, PATH_SEGMENT));
            rest = &rest[start + len + 1..];
        }

        path.push_str(rest);
        Ok(path)
    }
}
