use cms_client::api::{ApiClient, RelatedParams};
use cms_client::config::AppConfig;
use cms_client::logic::{ApiTreeSource, EntityTree};
use cms_client::model::Eid;
use cms_client::routes::{resolve, Route, RouteMatch};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("hyper", LevelFilter::Warn)
        .parse_default_env()
        .init();

    let config = AppConfig::load()?;
    let api = ApiClient::from_config(&config.api)?;
    log::info!("CMS backend at {}", api.root());

    let location = std::env::args().nth(1).unwrap_or_else(|| "/tree".to_string());
    let Some(found) = resolve(&location)? else {
        anyhow::bail!("no route matches {}", location);
    };

    match found.route {
        Route::Tree => print_tree(api, &config, &found).await?,
        Route::EditRelated => print_related(api, &found).await?,
        route => {
            println!("{} {:?}", route, found.params);
        }
    }

    Ok(())
}

/// `/tree?eid=..&top=..`: bootstrap the tree with its top sections and the
/// ancestors of `eid` expanded.
async fn print_tree(api: ApiClient, config: &AppConfig, found: &RouteMatch) -> anyhow::Result<()> {
    let top = eids(found.param("top"))?;
    let ancestors = match found.eid() {
        Some(eid) => {
            let mut path = eids(found.param("ancestors"))?;
            path.push(eid);
            path
        }
        None => top.clone(),
    };

    let tree = EntityTree::new(ApiTreeSource::new(api), config.editor.branch_types.clone());
    tree.bootstrap(&top, &ancestors).await?;
    for (depth, node) in tree.outline() {
        let marker = if node.isleaf { "-" } else { "+" };
        println!("{}{} {} ({})", "  ".repeat(depth), marker, node.title, node.entity_ref());
    }
    Ok(())
}

/// `/editrelated?name=..&eid=..&cw_etype=..`: list the current targets.
async fn print_related(api: ApiClient, found: &RouteMatch) -> anyhow::Result<()> {
    let entity = found
        .entity_ref()
        .ok_or_else(|| anyhow::anyhow!("eid and cw_etype parameters are required"))?;
    let rtype = found
        .param("name")
        .ok_or_else(|| anyhow::anyhow!("name parameter is required"))?;
    let params = RelatedParams {
        sort: found.param("sort").map(str::to_string),
        target_type: found.param("target_type").map(str::to_string),
    };

    let related = api.get_related(&entity.cw_etype, entity.eid, rtype, &params).await?;
    println!("{} of {}:", rtype, entity);
    for target in related {
        let option = target.related_option();
        println!("  {} {}", option.value, option.label);
    }
    Ok(())
}

fn eids(param: Option<&str>) -> anyhow::Result<Vec<Eid>> {
    param
        .unwrap_or_default()
        .split(',')
        .filter(|eid| !eid.is_empty())
        .map(|eid| Ok(eid.trim().parse::<Eid>()?))
        .collect()
}
