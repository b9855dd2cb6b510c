//! GraphQL query text and search parameter helpers for the Tokopedia
//! internal API.

pub const GRAPHQL_ENDPOINT: &str = "https://gql.tokopedia.com/graphql/SearchProductQueryV4";

pub const SEARCH_PRODUCT_QUERY: &str = r#"query SearchProductQueryV4($params: String!) {
    ace_search_product_v4(params: $params) {
        header {
        totalData
        totalDataText
        processTime
        responseCode
        errorMessage
        additionalParams
        keywordProcess
        __typename
        }
        data {
        isQuerySafe
        ticker {
            text
            query
            typeId
            __typename
        }
        redirection {
            redirectUrl
            departmentId
            __typename
        }
        related {
            relatedKeyword
            otherRelated {
            keyword
            url
            product {
                id
                name
                price
                imageUrl
                rating
                countReview
                url
                priceStr
                wishlist
                shop {
                city
                isOfficial
                isPowerBadge
                __typename
                }
                ads {
                id
                productClickUrl
                productWishlistUrl
                shopClickUrl
                productViewUrl
                __typename
                }
                __typename
            }
            __typename
            }
            __typename
        }
        suggestion {
            currentKeyword
            suggestion
            suggestionCount
            instead
            insteadCount
            query
            text
            __typename
        }
        products {
            id
            name
            ads {
            id
            productClickUrl
            productWishlistUrl
            productViewUrl
            __typename
            }
            badges {
            title
            imageUrl
            show
            __typename
            }
            category: departmentId
            categoryBreadcrumb
            categoryId
            categoryName
            countReview
            discountPercentage
            gaKey
            imageUrl
            labelGroups {
            position
            title
            type
            __typename
            }
            originalPrice
            price
            priceRange
            rating
            shop {
            id
            name
            url
            city
            isOfficial
            isPowerBadge
            __typename
            }
            url
            wishlist
            sourceEngine: source_engine
            __typename
        }
        __typename
        }
        __typename
    }
}"#;

/// Sort order constants accepted by the search API (`ob` parameter).
pub const SORT_BEST_MATCH: u32 = 23;
/// Most reviews (ulasan/terlaris).
pub const SORT_BEST_SELLER: u32 = 5;
pub const SORT_NEWEST: u32 = 9;
pub const SORT_PRICE_ASC: u32 = 3;
pub const SORT_PRICE_DESC: u32 = 4;

/// URL-encoded params string for `SearchProductQueryV4`.
pub fn build_search_params(keyword: &str, page: u32, rows: u32, order_by: u32) -> String {
    let start = (page.max(1) - 1) * rows;
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("device", "desktop")
        .append_pair("ob", &order_by.to_string())
        .append_pair("page", &page.to_string())
        .append_pair("q", keyword)
        .append_pair("rows", &rows.to_string())
        .append_pair("source", "search")
        .append_pair("start", &start.to_string())
        .finish()
}

/// Public search result page for a keyword.
pub fn search_page_url(keyword: &str, page: u32) -> String {
    let q: String = url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
    format!("https://www.tokopedia.com/search?q={q}&page={page}")
}
