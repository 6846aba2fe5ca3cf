use eyre::{Context, Result};
use utoipa::OpenApi;

use reelbin::openapi;

fn to_camel_case(s: &str) -> String {
    let mut cs = String::with_capacity(s.len());
    let mut it = s.chars().peekable();
    while let Some(c) = it.next() {
        match (c, it.peek()) {
            ('_', Some(nc)) if *nc != '_' => {
                cs.push(nc.to_ascii_uppercase());
                let _ = it.next();
            }
            (c, _) => cs.push(c),
        }
    }
    cs
}

fn main() -> Result<()> {
    let mut oapi: utoipa::openapi::OpenApi = openapi::ApiDoc::openapi();
    // operationIds from snake_case to camelCase
    oapi.paths.paths.iter_mut().for_each(|(_path, path_item)| {
        path_item.operations.iter_mut().for_each(|(_, op)| {
            op.operation_id = op.operation_id.as_ref().map(|name| to_camel_case(name));
        });
    });
    println!(
        "{}",
        oapi.to_pretty_json()
            .wrap_err("could not serialize OpenAPI document")?
    );
    Ok(())
}

#[test]
fn camel_case_operation_ids() {
    assert_eq!(to_camel_case("post_media"), "postMedia");
    assert_eq!(to_camel_case("get__media"), "get_Media");
    assert_eq!(to_camel_case("media_"), "media_");
}
