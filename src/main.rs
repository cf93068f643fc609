use chrono::{Local, NaiveDate};
use clap::{Args, Parser, ValueEnum};
use tracing::debug;

use sotd::config::{Config, TableSettings};
use sotd::filter::{self, FilterMode};
use sotd::semester::{SemesterFilter, ALL_SEMESTERS};
use sotd::session::{AnalyticsRequest, DateStatus, Session};
use sotd::sheets::SheetsTable;
use sotd::spotify::{Catalog, OfflineCatalog, SpotifyCatalog};
use sotd::spotify_auth::get_spotify_client;
use sotd::store::{BackingTable, JsonFileTable, SongLogStore};
use sotd::{Entry, Result, SotdError};

type CliSession = Session<Box<dyn BackingTable>, Box<dyn Catalog>>;

#[derive(Debug, Parser)]
#[command(name = "sotd", about = "Log and browse your songs of the day")]
enum Command {
    /// Show what is logged for a date (default: today).
    Check {
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Search Spotify for tracks.
    Search { query: String },
    /// Log a track for a date (default: today).
    Add {
        query: String,
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// 1-based index into the search results.
        #[arg(short, long, default_value_t = 1)]
        pick: usize,
        #[arg(short, long, default_value = "")]
        notes: String,
        /// Replace a song already logged for the date.
        #[arg(long)]
        overwrite: bool,
        /// Also add the track to the configured playlist if missing.
        #[arg(long)]
        add_to_playlist: bool,
    },
    /// Remove whatever is logged for a date.
    Overwrite {
        #[arg(short, long)]
        date: NaiveDate,
    },
    /// Top artists and songs over a period.
    Analytics(FilterArgs),
    /// Every song logged for artists matching a name.
    Artist {
        query: String,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Songs logged on this month and day in any year.
    Today {
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Full history, newest first, optionally narrowed by keyword.
    History {
        #[arg(short, long)]
        keyword: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Weeks,
    Months,
    Year,
    Range,
}

#[derive(Debug, Args)]
struct FilterArgs {
    #[arg(long, value_enum, default_value_t = Mode::Weeks)]
    mode: Mode,
    /// Calendar year for `--mode year` (default: newest year in the log).
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    start: Option<NaiveDate>,
    #[arg(long)]
    end: Option<NaiveDate>,
    /// e.g. "2024 - Jan–May".
    #[arg(long, default_value = ALL_SEMESTERS)]
    semester: String,
}

impl FilterArgs {
    fn request(&self, session: &CliSession) -> Result<AnalyticsRequest> {
        let mode = match self.mode {
            Mode::Weeks => FilterMode::last_four_weeks(),
            Mode::Months => FilterMode::last_six_months(),
            Mode::Year => {
                let year = match self.year {
                    Some(year) => year,
                    None => filter::available_years(session.log())
                        .first()
                        .copied()
                        .ok_or_else(|| SotdError::InvalidArgument("the log has no dated entries".into()))?,
                };
                FilterMode::CalendarYear(year)
            }
            Mode::Range => FilterMode::CustomRange {
                start: self.start,
                end: self.end,
            },
        };
        Ok(AnalyticsRequest {
            mode,
            semester: self.semester.parse::<SemesterFilter>()?,
        })
    }
}

async fn open_session(config: &Config, with_catalog: bool) -> Result<CliSession> {
    let table: Box<dyn BackingTable> = match &config.table {
        TableSettings::JsonFile(path) => Box::new(JsonFileTable::new(path)),
        TableSettings::Sheets(settings) => Box::new(SheetsTable::new(settings.clone(), config.timeout)?),
    };
    let store = SongLogStore::load(table).await?;
    debug!(entries = store.log().len(), "session opened");

    let catalog: Box<dyn Catalog> = if with_catalog {
        let spotify = get_spotify_client(&config.spotify()?).await?;
        Box::new(SpotifyCatalog::new(spotify, config.timeout))
    } else {
        Box::new(OfflineCatalog)
    };

    Ok(Session::new(
        store,
        catalog,
        config.playlist_id().ok().map(str::to_owned),
    ))
}

fn print_entry(entry: &Entry) {
    println!(
        "{}  {} by {}",
        entry.date_label(),
        entry.song_title,
        entry.artist
    );
    if !entry.notes.is_empty() {
        println!("            {}", entry.notes);
    }
}

async fn run(command: Command) -> Result<()> {
    let config = Config::from_env()?;
    let today = Local::now().date_naive();
    let now = Local::now().naive_local();

    match command {
        Command::Check { date } => {
            let session = open_session(&config, false).await?;
            let date = date.unwrap_or(today);
            match session.date_status(date) {
                DateStatus::Logged(entry) => {
                    println!("A song already exists for {date}:");
                    print_entry(&entry);
                }
                DateStatus::Vacant => println!("No song exists for {date}. Please add a song."),
            }
        }
        Command::Search { query } => {
            let session = open_session(&config, true).await?;
            for (i, track) in session.search_tracks(&query).await?.iter().enumerate() {
                println!("{:>2}. {} [{}]", i + 1, track.label(), track.album.name);
            }
        }
        Command::Add {
            query,
            date,
            pick,
            notes,
            overwrite,
            add_to_playlist,
        } => {
            let mut session = open_session(&config, true).await?;
            let date = date.unwrap_or(today);

            if let DateStatus::Logged(entry) = session.date_status(date) {
                if !overwrite {
                    println!(
                        "A song already exists for {date}: {} by {}. Use --overwrite to replace it.",
                        entry.song_title, entry.artist
                    );
                    return Ok(());
                }
            }

            let tracks = session.search_tracks(&query).await?;
            let track = pick
                .checked_sub(1)
                .and_then(|i| tracks.get(i))
                .ok_or_else(|| {
                    SotdError::InvalidArgument(format!(
                        "no search result #{pick} ({} found)",
                        tracks.len()
                    ))
                })?
                .clone();

            if add_to_playlist {
                if session.playlist_status(&track).await? {
                    println!("This song is already in the playlist.");
                } else {
                    session.add_to_playlist(&track).await?;
                    println!("Song added to playlist.");
                }
            }

            if overwrite && session.overwrite(date).await? > 0 {
                println!("The existing entry for {date} has been removed.");
            }
            let entry = session.save(date, &track, &notes).await?;
            println!("{} by {} added for {}.", entry.song_title, entry.artist, date);
        }
        Command::Overwrite { date } => {
            let mut session = open_session(&config, false).await?;
            match session.overwrite(date).await? {
                0 => println!("Nothing was logged for {date}."),
                n => println!("Removed {n} entr{} for {date}.", if n == 1 { "y" } else { "ies" }),
            }
        }
        Command::Analytics(args) => {
            let session = open_session(&config, true).await?;
            let request = args.request(&session)?;
            let view = session.analytics(&request, now).await?;

            println!("{} song(s) in range", view.entries);
            let semesters: Vec<String> = view.semester_options.iter().map(|s| s.label()).collect();
            println!("Semesters: {ALL_SEMESTERS}, {}", semesters.join(", "));

            println!("\nTop artists");
            for (place, placed) in view.artist_podium.iter().enumerate() {
                println!(
                    "  #{} {} - {} time(s)  {}",
                    place + 1,
                    placed.item.artist,
                    placed.item.count,
                    placed.image_url
                );
            }
            for artist in view.top_artists.iter().skip(view.artist_podium.len()) {
                println!("     {} - {}", artist.artist, artist.count);
            }

            println!("\nTop songs");
            for (place, placed) in view.song_podium.iter().enumerate() {
                println!(
                    "  #{} {} by {} - {} time(s)  {}",
                    place + 1,
                    placed.item.song_title,
                    placed.item.artist,
                    placed.item.count,
                    placed.image_url
                );
            }
            for song in view.top_songs.iter().skip(view.song_podium.len()) {
                println!("     {} by {} - {}", song.song_title, song.artist, song.count);
            }
        }
        Command::Artist { query, filter } => {
            let session = open_session(&config, false).await?;
            let request = filter.request(&session)?;
            let breakdown = session.artist_breakdown(&query, &request, now)?;
            if breakdown.songs.is_empty() {
                println!("No songs found for that artist in the selected date range.");
            } else {
                println!("{query} appeared {} times as Song of the Day.", breakdown.total);
                for song in &breakdown.songs {
                    let dates: Vec<String> = song.dates.iter().map(|d| d.to_string()).collect();
                    println!("  {} - chosen {} time(s)", song.song_title, song.times_chosen);
                    println!("    {}", dates.join(", "));
                }
            }
        }
        Command::Today { date } => {
            let session = open_session(&config, false).await?;
            let found = session.on_this_day(date.unwrap_or(today));
            if found.is_empty() {
                println!("No historical data found for this date.");
            }
            for entry in found {
                print_entry(entry);
            }
        }
        Command::History { keyword } => {
            let session = open_session(&config, false).await?;
            let found = session.history(keyword.as_deref());
            if let Some(keyword) = keyword.as_deref().filter(|k| !k.is_empty()) {
                println!("{} result(s) found for '{keyword}'", found.len());
            }
            for entry in found {
                print_entry(entry);
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    {
        use tracing_subscriber::prelude::*;

        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .init()
    }

    if let Err(err) = run(Command::parse()).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
