//! GraphQL wrappers around core types

use crate::core::query::Page;
use crate::services::{Category, Continent, Country, Destination, Highlight, User, Visit};
use async_graphql::{OutputType, SimpleObject};

/// One page of a list query
#[derive(Debug, Clone, SimpleObject)]
#[graphql(concrete(name = "ContinentPage", params(Continent)))]
#[graphql(concrete(name = "CountryPage", params(Country)))]
#[graphql(concrete(name = "DestinationPage", params(Destination)))]
#[graphql(concrete(name = "HighlightPage", params(Highlight)))]
#[graphql(concrete(name = "UserPage", params(User)))]
#[graphql(concrete(name = "CategoryPage", params(Category)))]
#[graphql(concrete(name = "VisitPage", params(Visit)))]
pub struct PageObject<T: OutputType> {
    pub items: Vec<T>,
    /// Matching rows ignoring pagination
    pub total_count: i64,
    pub has_more: bool,
}

impl<T: OutputType> From<Page<T>> for PageObject<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            items: page.items,
            total_count: page.total_count,
            has_more: page.has_more,
        }
    }
}
