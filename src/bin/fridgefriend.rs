use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fridgefriend::household::InviteOutcome;
use fridgefriend::inventory::{expiration_label, shelf_life_columns, storage};
use fridgefriend::models::{FoodItem, NotificationSettings, ProfileUpdate};
use fridgefriend::notifications::DigestOutcome;
use fridgefriend::prelude::*;
use fridgefriend_auth::SignUpOutcome;

#[derive(Parser, Debug)]
#[clap(name = "fridgefriend", version)]
#[clap(about = "Track household food, expiry dates and recipe ideas", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    /// Account email
    #[clap(long, env = "FRIDGEFRIEND_EMAIL", global = true)]
    email: Option<String>,

    /// Account password
    #[clap(long, env = "FRIDGEFRIEND_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    /// Output debug logs to stderr
    #[clap(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account
    Signup {
        #[clap(long)]
        phone: Option<String>,
    },
    /// Inventory items
    Items {
        #[clap(subcommand)]
        command: ItemCommands,
    },
    /// Expiry buckets, items needing attention and storage split
    Dashboard,
    /// Print item changes as household members make them
    Watch,
    /// Recipe suggestions from the inventory
    Recipes {
        #[clap(long)]
        search: Option<String>,
        /// relevance or time
        #[clap(long, default_value = "relevance")]
        sort: String,
        #[clap(long, default_value = "1")]
        page: usize,
    },
    Household {
        #[clap(subcommand)]
        command: HouseholdCommands,
    },
    /// Invitations to join other households
    Invites {
        #[clap(subcommand)]
        command: InviteCommands,
    },
    Notifications {
        #[clap(subcommand)]
        command: NotificationCommands,
    },
    Profile {
        #[clap(subcommand)]
        command: ProfileCommands,
    },
    /// Email a digest of expired and due-today items
    Alert,
}

#[derive(Subcommand, Debug)]
enum ItemCommands {
    /// List items, optionally filtered
    List {
        #[clap(long)]
        location: Option<String>,
        #[clap(long)]
        category: Option<String>,
        #[clap(long)]
        search: Option<String>,
        /// Only items expiring within a week
        #[clap(long)]
        expiring_soon: bool,
        /// Group into shelf-life columns
        #[clap(long)]
        board: bool,
    },
    Add {
        name: String,
        /// YYYY-MM-DD
        #[clap(long)]
        expiration: NaiveDate,
        #[clap(long, default_value = "1")]
        quantity: i64,
        #[clap(long, default_value = "piece")]
        unit: String,
        #[clap(long, default_value = "dairy")]
        category: String,
        #[clap(long, default_value = "refrigerator")]
        location: String,
        /// Defaults to today
        #[clap(long)]
        purchased: Option<NaiveDate>,
        #[clap(long)]
        notes: Option<String>,
    },
    Update {
        id: String,
        #[clap(long)]
        name: Option<String>,
        #[clap(long)]
        quantity: Option<i64>,
        #[clap(long)]
        unit: Option<String>,
        #[clap(long)]
        category: Option<String>,
        #[clap(long)]
        location: Option<String>,
        #[clap(long)]
        expiration: Option<NaiveDate>,
        #[clap(long)]
        purchased: Option<NaiveDate>,
        #[clap(long)]
        notes: Option<String>,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum HouseholdCommands {
    /// Household name and members
    Show,
    /// Rename the household, creating it if needed
    Save {
        #[clap(default_value = "")]
        name: String,
    },
    /// Invite a registered user by email
    Invite {
        email: String,
    },
    Members,
}

#[derive(Subcommand, Debug)]
enum InviteCommands {
    List,
    Accept { household_id: String },
}

#[derive(Subcommand, Debug)]
enum NotificationCommands {
    List,
    Read { id: String },
    ReadAll,
    Clear,
}

#[derive(Subcommand, Debug)]
enum ProfileCommands {
    Show,
    Set {
        #[clap(long)]
        name: Option<String>,
        /// Phone number
        #[clap(long)]
        number: Option<String>,
    },
    /// Change notification preferences; unset flags keep their value
    Notify {
        #[clap(long)]
        expiry: Option<bool>,
        #[clap(long)]
        inventory: Option<bool>,
        #[clap(long)]
        recipes: Option<bool>,
        #[clap(long)]
        email: Option<bool>,
    },
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.debug);

    let config = FridgeFriendConfig::from_env().context("Failed to load configuration")?;
    let client = FridgeFriend::new(config)?;

    let email = cli
        .email
        .clone()
        .ok_or_else(|| anyhow::anyhow!("--email or FRIDGEFRIEND_EMAIL is required"))?;
    let password = cli
        .password
        .clone()
        .ok_or_else(|| anyhow::anyhow!("--password or FRIDGEFRIEND_PASSWORD is required"))?;

    if let Commands::Signup { phone } = &cli.command {
        match client.sign_up(&email, &password, phone.as_deref()).await? {
            SignUpOutcome::SignedIn(session) => println!("Signed up as {}", session.user.id),
            SignUpOutcome::ConfirmationRequired(_) => {
                println!("Check {} for a confirmation link", email)
            }
        }
        return Ok(());
    }

    client
        .sign_in(&email, &password)
        .await
        .context("Sign in failed")?;
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Signup { .. } => {}
        Commands::Items { command } => items(&client, command, today).await?,
        Commands::Dashboard => dashboard(&client, today).await?,
        Commands::Watch => watch(&client).await?,
        Commands::Recipes { search, sort, page } => {
            let inventory = client.inventory();
            let items = inventory.fetch_items().await?;
            if items.is_empty() {
                println!("Your inventory is empty. Add items to get recipe suggestions.");
                return Ok(());
            }
            let browser = client.recipe_browser();
            browser.load_suggestions(&items).await?;
            let view = browser
                .view(&RecipeQuery {
                    search,
                    sort: sort.parse()?,
                    page,
                })
                .await;
            if view.recipes.is_empty() {
                println!("No recipes found matching your search.");
            }
            for recipe in &view.recipes {
                println!(
                    "{:<40} {:>3} min  uses {} / missing {}  {}",
                    recipe.title,
                    recipe.ready_in_minutes,
                    recipe.used_ingredient_count,
                    recipe.missed_ingredient_count,
                    recipe.source_url
                );
            }
            if view.total_pages > 1 {
                println!("Page {} of {}", view.page, view.total_pages);
            }
        }
        Commands::Household { command } => household(&client, command).await?,
        Commands::Invites { command } => {
            let households = client.households();
            match command {
                InviteCommands::List => {
                    let user = client.current_user().await?;
                    let invites = households.pending_invites(&user.id).await?;
                    if invites.is_empty() {
                        println!("You have no pending invitations.");
                    }
                    for invite in invites {
                        println!("{}  {}", invite.household_id, invite.household_name);
                    }
                }
                InviteCommands::Accept { household_id } => {
                    match households.accept_invite(&household_id).await? {
                        InviteOutcome::Accepted => println!("Invite accepted!"),
                        InviteOutcome::AlreadyAccepted => println!("Already a member"),
                    }
                }
            }
        }
        Commands::Notifications { command } => {
            let store = client.notifications();
            match command {
                NotificationCommands::List => {
                    let list = store.fetch_notifications().await?;
                    println!("{} unread", store.unread_count().await);
                    for n in list {
                        let marker = if n.read { " " } else { "*" };
                        println!("{} {} [{}] {}: {}", marker, n.id, n.kind, n.title, n.message);
                    }
                }
                NotificationCommands::Read { id } => store.mark_as_read(&id).await?,
                NotificationCommands::ReadAll => store.mark_all_as_read().await?,
                NotificationCommands::Clear => store.clear_notifications().await?,
            }
        }
        Commands::Profile { command } => profile(&client, command).await?,
        Commands::Alert => {
            let inventory = client.inventory();
            inventory.fetch_items().await?;
            let summary = inventory.summary(today).await;
            match client.expiry_alerter().send_expiry_digest(&summary).await? {
                DigestOutcome::NothingToSend => println!("Nothing is expired or due today"),
                DigestOutcome::AlreadySent => println!("Digest already sent"),
                DigestOutcome::Disabled => println!("Expiry notifications are turned off"),
                DigestOutcome::Recorded => println!("Warning recorded; email not sent"),
                DigestOutcome::Sent => println!("Expiry digest sent"),
            }
        }
    }

    Ok(())
}

async fn items(client: &FridgeFriend, command: ItemCommands, today: NaiveDate) -> anyhow::Result<()> {
    let inventory = client.inventory();
    match command {
        ItemCommands::List {
            location,
            category,
            search,
            expiring_soon,
            board,
        } => {
            let items = inventory.fetch_items().await?;
            let filtered = ItemFilter {
                location,
                category,
                search,
                expiring_soon,
            }
            .apply(&items, today);

            if board {
                for (column, list) in shelf_life_columns(&filtered, today) {
                    println!("{} ({})", column.title(), list.len());
                    for item in &list {
                        print_item(item, today);
                    }
                }
            } else {
                for item in &filtered {
                    print_item(item, today);
                }
            }
        }
        ItemCommands::Add {
            name,
            expiration,
            quantity,
            unit,
            category,
            location,
            purchased,
            notes,
        } => {
            let mut item = NewFoodItem::new(&name, expiration, purchased.unwrap_or(today));
            item.quantity = quantity;
            item.unit = unit;
            item.category = category;
            item.location = location;
            item.notes = notes;
            let created = inventory.add_item(item).await?;
            println!("Added {} ({})", created.name, created.id);
        }
        ItemCommands::Update {
            id,
            name,
            quantity,
            unit,
            category,
            location,
            expiration,
            purchased,
            notes,
        } => {
            let patch = FoodItemPatch {
                name,
                quantity,
                unit,
                category,
                location,
                expiration: expiration.map(|d| d.format("%Y-%m-%d").to_string()),
                purchased: purchased.map(|d| d.format("%Y-%m-%d").to_string()),
                notes,
            };
            if patch.is_empty() {
                anyhow::bail!("nothing to update");
            }
            inventory.update_item(&id, &patch).await?;
            println!("Updated {}", id);
        }
        ItemCommands::Delete { id } => {
            inventory.delete_item(&id).await?;
            println!("Deleted {}", id);
        }
    }
    Ok(())
}

fn print_item(item: &FoodItem, today: NaiveDate) {
    println!(
        "  {:<24} {:>3} {:<6} {:<12} {:<10} {}",
        item.name,
        item.quantity,
        item.unit,
        item.location,
        item.expiration.get(..10).unwrap_or(&item.expiration),
        expiration_label(item, today)
    );
}

async fn dashboard(client: &FridgeFriend, today: NaiveDate) -> anyhow::Result<()> {
    let inventory = client.inventory();
    inventory.fetch_items().await?;
    let summary = inventory.summary(today).await;

    println!("Expired:          {}", summary.expired.len());
    println!("Expires today:    {}", summary.today.len());
    println!("Within a week:    {}", summary.this_week.len());
    println!("Later:            {}", summary.later.len());

    let attention = summary.attention_needed(client.options().attention_limit);
    if !attention.is_empty() {
        println!("\nNeeds attention");
        for item in &attention {
            print_item(item, today);
        }
    }

    let distribution = inventory.storage_location_counts().await;
    if !distribution.is_empty() {
        println!("\nStorage");
        for (location, count) in distribution.entries_by_count() {
            println!(
                "  {:<14} {:>3}  {:>5.1}%",
                storage::display_name(&location),
                count,
                distribution.share(&location)
            );
        }
    }
    Ok(())
}

async fn watch(client: &FridgeFriend) -> anyhow::Result<()> {
    let inventory = client.inventory();
    let items = inventory.fetch_items().await?;
    println!("{} items; watching for changes (Ctrl-C to stop)", items.len());

    let mut changes = inventory.watch().await?;
    loop {
        tokio::select! {
            change = changes.next_change() => {
                let Some(change) = change else { break };
                match change {
                    ItemChange::Insert(item) => println!("+ {}", item.name),
                    ItemChange::Update(item) => println!("~ {}", item.name),
                    ItemChange::Delete { id } => println!("- {}", id),
                    ItemChange::Error(e) => tracing::warn!("unreadable change: {}", e),
                }
                let items = inventory.fetch_items().await?;
                println!("{} items", items.len());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    drop(changes);
    client.realtime().disconnect().await?;
    Ok(())
}

async fn household(client: &FridgeFriend, command: HouseholdCommands) -> anyhow::Result<()> {
    let households = client.households();
    match command {
        HouseholdCommands::Show | HouseholdCommands::Members => {
            let profile = client.profile().fetch_profile().await?;
            let Some(household_id) = profile.and_then(|p| p.household_id) else {
                println!("You don't have a household yet.");
                return Ok(());
            };
            if matches!(command, HouseholdCommands::Show) {
                let name = households.household_name().await?.unwrap_or_default();
                println!("{} ({})", name, household_id);
            }
            for entry in households.members(&household_id).await? {
                println!(
                    "  {:<28} {:<20} {:?}/{:?}",
                    entry.profile.email.unwrap_or_default(),
                    entry.profile.name.unwrap_or_default(),
                    entry.member.role,
                    entry.member.status
                );
            }
        }
        HouseholdCommands::Save { name } => {
            let household = households.save_household_name(&name).await?;
            println!("Household saved: {}", household.name);
        }
        HouseholdCommands::Invite { email } => {
            households.invite_by_email(&email).await?;
            println!("Invitation sent!");
        }
    }
    Ok(())
}

async fn profile(client: &FridgeFriend, command: ProfileCommands) -> anyhow::Result<()> {
    let store = client.profile();
    match command {
        ProfileCommands::Show => {
            let user = client.current_user().await?;
            let profile = store.fetch_profile().await?;
            println!("Name:      {}", store.display_name(&user).await);
            println!("Email:     {}", user.email.unwrap_or_default());
            if let Some(profile) = profile {
                let settings = NotificationSettings::from(&profile);
                println!("Phone:     {}", profile.number.unwrap_or_default());
                println!("Household: {}", profile.household_id.unwrap_or_default());
                println!("{:#?}", settings);
            }
        }
        ProfileCommands::Set { name, number } => {
            store
                .save_profile(&ProfileUpdate {
                    name,
                    number,
                    ..Default::default()
                })
                .await?;
            println!("Profile saved");
        }
        ProfileCommands::Notify {
            expiry,
            inventory,
            recipes,
            email,
        } => {
            let current = store.notification_settings().await?;
            let settings = NotificationSettings {
                expiry_notifications: expiry.unwrap_or(current.expiry_notifications),
                inventory_updates: inventory.unwrap_or(current.inventory_updates),
                recipe_recommendations: recipes.unwrap_or(current.recipe_recommendations),
                email_notifications: email.unwrap_or(current.email_notifications),
            };
            store.save_notification_settings(settings).await?;
            println!("Notification settings saved");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
