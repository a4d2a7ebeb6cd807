//! Live listing against api.github.com.
//! Run with: cargo test -p starbackup-github --test live_starred -- --ignored --nocapture

use starbackup_github::{GitHubClient, GitHubConfig, TargetUser};

#[tokio::test]
#[ignore] // requires GH_TOKEN and GH_USERNAME
async fn test_live_starred() {
    let config = GitHubConfig::new(std::env::var("GH_TOKEN").expect("GH_TOKEN"));
    let client = GitHubClient::new(&config).unwrap();
    let target = TargetUser {
        id: None,
        username: Some(std::env::var("GH_USERNAME").expect("GH_USERNAME")),
    };

    let user = client.resolve_user(&target).await.unwrap();
    let listing = client.list_starred(&user.login).await.unwrap();
    println!(
        "{} starred repos over {} pages (rate limited: {:?})",
        listing.repos.len(),
        listing.pages,
        listing.rate_limited_until
    );
}
