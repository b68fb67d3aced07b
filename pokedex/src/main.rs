use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use pokedex::{
    CollectionStore, CollectionSync, Config, DetailStatus, DetailStore, FileStorage, ListStatus,
    ListStore, PokeApiClient, PokemonDetail, PokemonList, PokemonSource, ResponseCache, Storage,
};

/// Pokedex client backed by PokeAPI, with a persisted caught collection
#[derive(Parser, Debug)]
#[command(name = "pokedex")]
#[command(about = "Browse PokeAPI and keep a caught collection")]
struct Args {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List pokemon page by page
    List {
        /// Number of pages to load
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        pages: u32,

        /// Case-insensitive name filter
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one pokemon by id or name
    Show { id_or_name: String },
    /// Add a pokemon to the collection
    Catch { id_or_name: String },
    /// Remove a pokemon from the collection
    Release { id: u32 },
    /// Print the caught collection, newest first
    Collection,
    /// Follow collection changes written by other processes
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: u64,
    },
}

struct App {
    config: Config,
    storage: Rc<FileStorage>,
    source: Rc<dyn PokemonSource>,
    cache: Rc<ResponseCache>,
}

impl App {
    fn new(config: Config) -> Self {
        let storage = Rc::new(FileStorage::new(config.data_dir()));
        let mut client = PokeApiClient::new(config.api_base.clone());
        if let Some(dir) = config.http_cache_dir() {
            client = client.with_cache_dir(dir);
        }
        Self {
            config,
            storage,
            source: Rc::new(client),
            cache: Rc::new(ResponseCache::default()),
        }
    }

    fn storage(&self) -> Rc<dyn Storage> {
        self.storage.clone()
    }

    async fn collection(&self) -> CollectionSync {
        let store = Rc::new(RefCell::new(CollectionStore::new()));
        CollectionSync::mount(store, self.storage(), self.storage.as_ref()).await
    }

    async fn list(&self) -> PokemonList {
        let store = Rc::new(RefCell::new(ListStore::with_defaults()));
        PokemonList::mount(
            store,
            Rc::clone(&self.source),
            Rc::clone(&self.cache),
            self.storage(),
            self.config.list_options(),
        )
        .await
    }

    async fn detail(&self, id_or_name: &str) -> io::Result<PokemonDetail> {
        let store = Rc::new(RefCell::new(DetailStore::with_defaults()));
        let detail = PokemonDetail::open(
            store,
            Rc::clone(&self.source),
            Rc::clone(&self.cache),
            id_or_name,
        );
        if detail.query().is_none() {
            return Err(failure(format!("invalid pokemon id or name: {id_or_name:?}")));
        }
        detail.load().await;
        match detail.status() {
            DetailStatus::Success => Ok(detail),
            DetailStatus::NotFound => Err(failure(format!("pokemon not found: {id_or_name}"))),
            _ => Err(failure(format!("failed to load pokemon: {id_or_name}"))),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> io::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pokedex=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .compact()
        .try_init()
        .ok();

    let args = Args::parse();
    let app = App::new(args.config);

    match args.command {
        Command::List { pages, search } => run_list(&app, pages, search).await,
        Command::Show { id_or_name } => run_show(&app, &id_or_name).await,
        Command::Catch { id_or_name } => run_catch(&app, &id_or_name).await,
        Command::Release { id } => run_release(&app, id).await,
        Command::Collection => run_collection(&app).await,
        Command::Watch { interval_ms } => {
            run_watch(&app, Duration::from_millis(interval_ms)).await
        }
    }
}

async fn run_list(app: &App, pages: u32, search: Option<String>) -> io::Result<()> {
    let collection = app.collection().await;
    let list = app.list().await;
    for _ in 1..pages {
        if !list.has_next_page() {
            break;
        }
        list.fetch_next_page().await;
    }
    if list.status() == ListStatus::Error {
        return Err(failure("failed to load pokemon list".to_string()));
    }

    if let Some(query) = search {
        let mut settled = list.debounced_query_changes();
        list.set_search_query(query);
        settled
            .changed()
            .await
            .map_err(|err| failure(err.to_string()))?;
    }

    for item in list.items() {
        let marker = if collection.is_caught(item.id) { "*" } else { " " };
        println!(
            "{marker} #{:03} {:<12} {}",
            item.id,
            item.name,
            item.types.join("/")
        );
    }
    println!(
        "{} of {} loaded{}",
        list.loaded_through(),
        list.total_count(),
        if list.has_next_page() { ", more available" } else { "" }
    );
    Ok(())
}

async fn run_show(app: &App, id_or_name: &str) -> io::Result<()> {
    let collection = app.collection().await;
    let detail = app.detail(id_or_name).await?;
    if let Some(pokemon) = detail.detail() {
        println!("#{:03} {}", pokemon.id, pokemon.name);
        println!("types:  {}", pokemon.types.join("/"));
        println!("image:  {}", pokemon.image_url);
        println!("status: {:?}", collection.catch_status_of(pokemon.id));
    }
    Ok(())
}

async fn run_catch(app: &App, id_or_name: &str) -> io::Result<()> {
    let collection = app.collection().await;
    let detail = app.detail(id_or_name).await?;
    let Some(pokemon) = detail.to_catch() else {
        return Err(failure(format!("failed to load pokemon: {id_or_name}")));
    };
    if collection.is_caught(pokemon.id) {
        println!("{} is already in the collection", pokemon.name);
        return Ok(());
    }
    let name = pokemon.name.clone();
    collection.catch(pokemon).await;
    println!("caught {name} ({} total)", collection.count());
    Ok(())
}

async fn run_release(app: &App, id: u32) -> io::Result<()> {
    let collection = app.collection().await;
    if !collection.is_caught(id) {
        println!("#{id:03} is not in the collection");
        return Ok(());
    }
    collection.release(id).await;
    println!("released #{id:03} ({} left)", collection.count());
    Ok(())
}

async fn run_collection(app: &App) -> io::Result<()> {
    let collection = app.collection().await;
    let list_store = Rc::new(RefCell::new(ListStore::with_defaults()));
    let list = PokemonList::new(
        list_store,
        Rc::clone(&app.source),
        Rc::clone(&app.cache),
        app.storage(),
        app.config.list_options(),
    );
    list.rehydrate().await;
    let total = list.dex_total();

    let state = collection.store().borrow().state().clone();
    for pokemon in state.sorted_by_recent() {
        println!(
            "#{:03} {:<12} {:<16} {}",
            pokemon.id,
            pokemon.name,
            pokemon.types.join("/"),
            pokemon.caught_at
        );
    }
    for (kind, count) in state.count_by_primary_type() {
        println!("{kind}: {count}");
    }
    println!(
        "{}/{} caught ({:.1}%)",
        state.count(),
        total,
        state.progress(total) * 100.0
    );
    Ok(())
}

async fn run_watch(app: &App, interval: Duration) -> io::Result<()> {
    let collection = app.collection().await;
    println!("{} caught, watching {}", collection.count(), app.storage.dir().display());
    let _listener = collection.subscribe(|state| {
        println!("collection changed: {} caught", state.count());
    });

    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(err) = app.storage.poll_external_changes().await {
            tracing::warn!(error = %err, "failed to poll storage");
        }
    }
}

fn failure(message: String) -> io::Error {
    io::Error::other(message)
}
