use ravel::{FlattenOptions, Structure, flatten_json, flatten_with};
use serde_json::json;

fn main() -> ravel::Result<()> {
    let params = json!({
        "embedding": [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]],
        "layers": [
            {"w": [[1.0, 0.0], [0.0, 1.0]], "b": [0.0, 0.0]},
            {"w": [[0.5], [-0.5]], "b": 0.1}
        ],
        "temperature": 1.0
    });

    // RAVEL_EMPTY_POLICY=zero-length lets structures without leaves through.
    let options = FlattenOptions::from_env()?;
    let (w, unflatten) = flatten_with(&Structure::from_json(&params)?, &options)?;
    println!("flat vector of {} elements", w.len());
    for leaf in unflatten.signature().leaves() {
        println!("  {:<22} shape {:?} at {}..{}", leaf.path.to_string(), leaf.shape, leaf.offset, leaf.offset + leaf.len);
    }

    // Any vector of the right length rebuilds the same nesting.
    let doubled: Vec<f64> = w.iter().map(|x| 2.0 * x).collect();
    let rebuilt: Structure = unflatten.unflatten(&doubled)?;
    println!("{}", serde_json::to_string_pretty(&rebuilt).unwrap_or_default());

    if let Err(err) = flatten_json(&json!({"name": "model", "w": [1.0]})) {
        println!("rejected: {err}");
    }
    Ok(())
}
