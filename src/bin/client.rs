use clap::{Args, Parser, Subcommand, ValueEnum};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(name = "receipt-client")]
#[command(about = "client cli used by shop owners to issue and look up receipts", version, long_about = None
)]
struct Cli {
    #[arg(long, global = true, default_value = "http://localhost:8080", help = "Server base url")]
    host: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// create an account
    #[command(arg_required_else_help = true)]
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, help = "Name printed on receipts, defaults to the username")]
        business_name: Option<String>,
    },
    /// log in and print the issued tokens
    #[command(arg_required_else_help = true)]
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// receipt related ops
    #[command(arg_required_else_help = true)]
    Receipt(ReceiptArgs),
}

#[derive(Debug, Args)]
struct ReceiptArgs {
    #[arg(long, short = 't', help = "Access token, needed by create, get and list")]
    token: Option<String>,
    #[command(subcommand)]
    command: ReceiptCmds,
}

#[derive(Debug, Subcommand)]
enum ReceiptCmds {
    #[command(arg_required_else_help = true)]
    Create {
        #[arg(long = "item", help = "Item as NAME:UNIT_PRICE:QUANTITY", value_name = "ITEM", num_args = 1.., required = true)]
        items: Vec<ItemArg>,
        #[arg(long, value_enum, default_value_t = Method::Cash)]
        method: Method,
        #[arg(long, help = "Amount tendered, e.g. 100.50")]
        amount: String,
    },
    #[command(arg_required_else_help = true)]
    Get { id: i64 },
    List {
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=100))]
        per_page: u32,
        #[arg(long, value_enum)]
        method: Option<Method>,
    },
    /// print the plain-text receipt
    #[command(arg_required_else_help = true)]
    Txt {
        id: i64,
        #[arg(long, value_parser = clap::value_parser!(u32).range(28..))]
        line_width: Option<u32>,
    },
    /// save the QR code of a receipt as PNG
    #[command(arg_required_else_help = true)]
    Qr {
        id: i64,
        #[arg(long, short = 'o')]
        out: PathBuf,
        #[arg(long, value_enum, default_value_t = QrTarget::Html)]
        mode: QrTarget,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Method {
    Cash,
    Cashless,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Cash => "cash",
            Method::Cashless => "cashless",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum QrTarget {
    Html,
    Txt,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemArg {
    name: String,
    unit_price: String,
    quantity: u32,
}

impl FromStr for ItemArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, ':');
        let (Some(quantity), Some(unit_price), Some(name)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("expected NAME:UNIT_PRICE:QUANTITY, got {s}"));
        };
        Ok(ItemArg {
            name: name.to_string(),
            unit_price: unit_price.to_string(),
            quantity: quantity
                .parse()
                .map_err(|e| format!("invalid quantity {quantity}: {e}"))?,
        })
    }
}

fn authorized(req: RequestBuilder, token: &Option<String>) -> Result<RequestBuilder, anyhow::Error> {
    match token {
        Some(token) => Ok(req.bearer_auth(token)),
        None => anyhow::bail!("this command needs --token, run `login` first"),
    }
}

/// Prints the body of a successful response, or the server's error detail.
async fn report(res: Response, expected: StatusCode) -> Result<(), anyhow::Error> {
    let status = res.status();
    let body = res.text().await?;
    match status {
        s if s == expected => println!("{}", pretty(&body)),
        StatusCode::UNAUTHORIZED => println!("not authorized, please log in again"),
        StatusCode::NOT_FOUND => println!("Resource not found: {}", pretty(&body)),
        unexpected => println!("got unexpected status code, {}: {}", unexpected, pretty(&body)),
    }
    Ok(())
}

fn pretty(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or_else(|_| body.to_string())
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Cli::parse();
    let host = args.host.trim_end_matches('/').to_string();
    let client = Client::new();

    match args.command {
        Commands::Signup {
            username,
            email,
            password,
            business_name,
        } => {
            let res = client
                .post(format!("{host}/api/auth/signup"))
                .json(&serde_json::json!({
                    "username": username,
                    "email": email,
                    "password": password,
                    "business_name": business_name,
                }))
                .send()
                .await?;
            report(res, StatusCode::CREATED).await?;
        }
        Commands::Login { email, password } => {
            let res = client
                .post(format!("{host}/api/auth/login"))
                .json(&serde_json::json!({ "email": email, "password": password }))
                .send()
                .await?;
            report(res, StatusCode::OK).await?;
        }
        Commands::Receipt(ReceiptArgs { token, command }) => match command {
            ReceiptCmds::Create {
                items,
                method,
                amount,
            } => {
                let req = client
                    .post(format!("{host}/api/receipts"))
                    .json(&serde_json::json!({
                        "items": items,
                        "payment": {"paymentMethod": method.as_str(), "amountTendered": amount},
                    }));
                let res = authorized(req, &token)?.send().await?;
                match res.status() {
                    StatusCode::BAD_REQUEST => {
                        println!("payment does not cover the total: {}", res.text().await?)
                    }
                    _ => report(res, StatusCode::CREATED).await?,
                }
            }
            ReceiptCmds::Get { id } => {
                let req = client.get(format!("{host}/api/receipts/{id}"));
                report(authorized(req, &token)?.send().await?, StatusCode::OK).await?;
            }
            ReceiptCmds::List {
                page,
                per_page,
                method,
            } => {
                let mut query = vec![
                    ("page", page.to_string()),
                    ("per_page", per_page.to_string()),
                ];
                if let Some(method) = method {
                    query.push(("payment_method", method.as_str().to_string()));
                }
                let req = client.get(format!("{host}/api/receipts")).query(&query);
                report(authorized(req, &token)?.send().await?, StatusCode::OK).await?;
            }
            ReceiptCmds::Txt { id, line_width } => {
                let mut req = client.get(format!("{host}/{id}/txt"));
                if let Some(width) = line_width {
                    req = req.query(&[("line_width", width)]);
                }
                let res = req.send().await?;
                match res.status() {
                    StatusCode::OK => println!("{}", res.text().await?),
                    _ => report(res, StatusCode::OK).await?,
                }
            }
            ReceiptCmds::Qr { id, out, mode } => {
                let mode = match mode {
                    QrTarget::Html => "html",
                    QrTarget::Txt => "txt",
                };
                let res = client
                    .get(format!("{host}/{id}/qr-code"))
                    .query(&[("mode", mode)])
                    .send()
                    .await?;
                match res.status() {
                    StatusCode::OK => {
                        let png = res.bytes().await?;
                        tokio::fs::write(&out, &png).await?;
                        println!("QR code of receipt {} saved to {}", id, out.display());
                    }
                    _ => report(res, StatusCode::OK).await?,
                }
            }
        },
    };
    Ok(())
}
