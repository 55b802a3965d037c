//! Common test utilities for the adapter integration tests
//!
//! Builds one adapter of each archetype over a shared [`MockCloud`].

#![allow(dead_code)]

pub mod mock_cloud;

pub use mock_cloud::{MockCloud, Resource, PAGE_SIZE};

use overlook::{
    format_scope, AlwaysGetAdapter, Attributes, DescribeOnlyAdapter, GetListAdapter, Item,
    QueryError, TokenPaginator,
};
use overlook::fetch::BoxPaginator;
use std::sync::Arc;

pub const ACCOUNT: &str = "052392120703";
pub const REGION: &str = "eu-west-1";
pub const ITEM_TYPE: &str = "mock-queue";

pub fn scope() -> String {
    format_scope(ACCOUNT, REGION)
}

/// Identifier for `name` in `account`
pub fn identifier(account: &str, name: &str) -> String {
    format!("arn:aws:mock:{}:{}:queue/{}", REGION, account, name)
}

pub fn resource_item(scope: &str, resource: &Resource) -> Item {
    let mut attrs = Attributes::new();
    attrs.insert("name", resource.name.clone());
    attrs.insert("marker", resource.marker);
    Item::new(ITEM_TYPE, "name", attrs, scope)
}

pub fn marker(item: &Item) -> u64 {
    item.attributes
        .get("marker")
        .and_then(|v| v.as_u64())
        .unwrap_or_default()
}

pub fn sorted_names(items: &[Item]) -> Vec<String> {
    let mut names: Vec<String> = items.iter().map(Item::unique_attribute_value).collect();
    names.sort();
    names
}

/// List pages names; every name is then resolved with a get.
pub fn always_get_adapter(cloud: Arc<MockCloud>) -> AlwaysGetAdapter<(), Vec<String>, String> {
    let pages = Arc::clone(&cloud);
    AlwaysGetAdapter::new(ITEM_TYPE, scope())
        .with_list_input(())
        .with_paginator_builder(move |_input: ()| -> BoxPaginator<Vec<String>> {
            let cloud = Arc::clone(&pages);
            Box::new(TokenPaginator::from_fn(move |token: Option<String>| {
                let cloud = Arc::clone(&cloud);
                async move { cloud.list_page(token).await }
            }))
        })
        .with_list_output_mapper(|page: Vec<String>, _input: &()| Ok(page))
        .with_get_input_mapper(|_scope: &str, query: &str| query.to_string())
        .with_get(move |scope: String, name: String| {
            let cloud = Arc::clone(&cloud);
            async move {
                let resource = cloud.get(&name).await?;
                Ok(resource_item(&scope, &resource))
            }
        })
}

/// Get and list both return full resources.
pub fn get_list_adapter(cloud: Arc<MockCloud>) -> GetListAdapter<Resource> {
    let lister = Arc::clone(&cloud);
    GetListAdapter::new(ITEM_TYPE, scope())
        .with_get(move |_scope: String, name: String| {
            let cloud = Arc::clone(&cloud);
            async move { cloud.get(&name).await }
        })
        .with_list(move |_scope: String| {
            let cloud = Arc::clone(&lister);
            async move { cloud.list_all().await }
        })
        .with_item_mapper(|_query: Option<&str>, scope: &str, resource: &Resource| Ok(resource_item(scope, resource)))
}

/// One describe call, filtered by name prefix for Get.
pub fn describe_adapter(cloud: Arc<MockCloud>) -> DescribeOnlyAdapter<Option<String>, Vec<Resource>> {
    DescribeOnlyAdapter::new(ITEM_TYPE, scope())
        .with_describe(move |prefix: Option<String>| {
            let cloud = Arc::clone(&cloud);
            async move { cloud.describe(prefix.as_deref()).await }
        })
        .with_get_input_mapper(|_scope: &str, query: &str| Ok(Some(query.to_string())))
        .with_list_input_mapper(|_scope: &str| Ok(None))
        .with_output_mapper(|scope: &str, _input: &Option<String>, output: Vec<Resource>| {
            Ok::<_, QueryError>(output.iter().map(|r| resource_item(scope, r)).collect())
        })
}
