use std::{str::FromStr, time::Instant};

use anyhow::{anyhow, bail, Context, Result};
use canopy_core::{
    containers::{Array, Dataset, IndexTranslation},
    tree::{NodeId, Tree},
};
use canopy_index::{KdTreeParams, Points, PointsTreeExt, Scope};
use clap::{App, Arg, ArgMatches};
use log::info;
use rand::{distributions::Uniform, rngs::SmallRng, Rng, SeedableRng};

struct Args {
    pub nodes: usize,
    pub points_per_node: usize,
    pub depth: usize,
    pub k: usize,
    pub radius: Option<f64>,
    pub query: Vec<f64>,
    pub leaf_size: usize,
    pub seed: u64,
}

fn parse_value<T>(matches: &ArgMatches, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = matches
        .value_of(name)
        .ok_or_else(|| anyhow!("Missing value for {}", name))?;
    value
        .parse()
        .with_context(|| format!("Invalid value {:?} for {}", value, name))
}

/// The random tree always has a root, so it cannot have fewer than one node
fn parse_node_count(value: &str) -> Result<usize> {
    let nodes = value
        .parse::<usize>()
        .with_context(|| format!("Invalid value {:?} for NODES", value))?;
    if nodes == 0 {
        bail!("NODES must be at least 1");
    }
    Ok(nodes)
}

fn get_args() -> Result<Args> {
    let matches = App::new("canopy scope query")
        .version("0.1")
        .about("Builds a random tree of point clouds and runs a scoped nearest neighbor query on it")
        .arg(
            Arg::with_name("NODES")
                .short("n")
                .long("nodes")
                .takes_value(true)
                .default_value("16")
                .help("Number of nodes in the random tree, at least 1"),
        )
        .arg(
            Arg::with_name("POINTS")
                .short("p")
                .long("points")
                .takes_value(true)
                .default_value("1000")
                .help("Number of points per node"),
        )
        .arg(
            Arg::with_name("DEPTH")
                .short("d")
                .long("depth")
                .takes_value(true)
                .default_value("0")
                .help("Number of tree levels that take part in the query, 0 for all levels"),
        )
        .arg(
            Arg::with_name("K")
                .short("k")
                .takes_value(true)
                .default_value("5")
                .help("Number of nearest neighbors to search"),
        )
        .arg(
            Arg::with_name("RADIUS")
                .short("r")
                .long("radius")
                .takes_value(true)
                .help("If set, also run a radius query with this radius"),
        )
        .arg(
            Arg::with_name("QUERY")
                .short("q")
                .long("query")
                .takes_value(true)
                .default_value("0,0,0")
                .help("Query point as comma-separated x,y,z coordinates"),
        )
        .arg(
            Arg::with_name("LEAF_SIZE")
                .long("leaf-size")
                .takes_value(true)
                .default_value("16")
                .help("Maximum number of points in a kd tree leaf"),
        )
        .arg(
            Arg::with_name("SEED")
                .short("s")
                .long("seed")
                .takes_value(true)
                .default_value("0")
                .help("Seed for the random point clouds"),
        )
        .get_matches();

    let query = matches
        .value_of("QUERY")
        .unwrap_or("0,0,0")
        .split(',')
        .map(|value| {
            value
                .trim()
                .parse::<f64>()
                .with_context(|| format!("Invalid query coordinate {:?}", value))
        })
        .collect::<Result<Vec<_>>>()?;
    let radius = match matches.value_of("RADIUS") {
        Some(_) => Some(parse_value(&matches, "RADIUS")?),
        None => None,
    };

    Ok(Args {
        nodes: parse_node_count(matches.value_of("NODES").unwrap_or("16"))?,
        points_per_node: parse_value(&matches, "POINTS")?,
        depth: parse_value(&matches, "DEPTH")?,
        k: parse_value(&matches, "K")?,
        radius,
        query,
        leaf_size: parse_value(&matches, "LEAF_SIZE")?,
        seed: parse_value(&matches, "SEED")?,
    })
}

fn random_cloud(rng: &mut SmallRng, num_points: usize) -> Result<Dataset> {
    let distribution = Uniform::new(-100.0, 100.0);
    let mut column = || {
        Array::new(
            (0..num_points)
                .map(|_| rng.sample(&distribution))
                .collect::<Vec<f64>>(),
        )
    };
    let dataset = Dataset::from_arrays(vec![("x", column()), ("y", column()), ("z", column())])?;
    Ok(dataset)
}

fn build_random_tree(args: &Args) -> Result<Tree<Points>> {
    let mut rng = SmallRng::seed_from_u64(args.seed);
    let params = KdTreeParams::with_leaf_size(args.leaf_size);
    let new_node = |rng: &mut SmallRng| -> Result<Points> {
        let mut points = Points::new().with_kd_params(params);
        points.insert("3d", random_cloud(rng, args.points_per_node)?);
        Ok(points)
    };

    let mut tree = Tree::new(new_node(&mut rng)?);
    let mut nodes = vec![tree.root()];
    for _ in 1..args.nodes {
        let parent = nodes[rng.gen_range(0..nodes.len())];
        let value = new_node(&mut rng)?;
        nodes.push(tree.insert(parent, value)?);
    }
    Ok(tree)
}

fn describe(tree: &Tree<Points>, node: NodeId) -> String {
    let depth = tree.ancestors(node).map(|ancestors| ancestors.count()).unwrap_or(0);
    format!("{:?} (level {})", node, depth)
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = get_args()?;
    let t_start = Instant::now();
    let mut tree = build_random_tree(&args)?;
    info!(
        "Built a tree of {} nodes in {:.3}s",
        tree.node_count(),
        t_start.elapsed().as_secs_f64()
    );

    let scope = Scope::new("3d", ["x", "y", "z"], args.depth);
    let root = tree.root();
    let t_start = Instant::now();
    let view = tree.scoped_view(root, &scope)?;
    info!(
        "Built scoped view {} in {:.3}s",
        scope,
        t_start.elapsed().as_secs_f64()
    );
    println!(
        "{}: {} point clouds, {} points",
        scope,
        view.len(),
        view.num_points()
    );

    let view = tree
        .value(root)?
        .cached_view(&scope)
        .ok_or_else(|| anyhow!("Scoped view {} is not cached", scope))?;
    let kd = view.kd();
    println!("{} nearest neighbors of {:?}:", args.k, args.query);
    for neighbor in kd.knn(args.k, &args.query)? {
        let point = kd.point(&neighbor.cursor).to_vector::<f64>()?;
        println!(
            "\t{:>10.4} [{:.3}, {:.3}, {:.3}] at point {} of node {}",
            neighbor.distance,
            point[0],
            point[1],
            point[2],
            kd.minor_index(&neighbor.cursor),
            describe(&tree, view.nodes()[kd.major_index(&neighbor.cursor)])
        );
    }

    if let Some(radius) = args.radius {
        let found = kd.radius(radius, &args.query)?;
        println!("{} points within {} of {:?}", found.len(), radius, args.query);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node_count() {
        assert_eq!(1, parse_node_count("1").unwrap());
        assert_eq!(16, parse_node_count("16").unwrap());
        assert!(parse_node_count("0").is_err());
        assert!(parse_node_count("-3").is_err());
        assert!(parse_node_count("many").is_err());
    }
}
